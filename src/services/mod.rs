


// sample callers wired through the coordination layer

pub mod shortlist;
pub mod notify;
