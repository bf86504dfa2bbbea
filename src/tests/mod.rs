


// ram store backed, redis needs a live server so only its reply mapping is covered here

mod support;
mod dlm;
mod txguard;
mod error;
