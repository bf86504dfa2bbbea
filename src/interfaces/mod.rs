


// trait interfaces at the edges of the coordination layer, the store,
// the ambient transaction boundary and the mail dispatch

pub mod store;
pub mod tx;
pub mod mail;
