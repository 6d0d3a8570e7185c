pub mod account;
pub mod ad_objects;
pub mod dn;
pub mod fsmo;

pub use account::*;
pub use ad_objects::*;
pub use fsmo::*;
