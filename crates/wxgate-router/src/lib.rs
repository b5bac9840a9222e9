pub mod params;
pub mod router;

pub use params::{Handler, Params};
pub use router::{Category, Matcher, Router, RouterBuilder};
