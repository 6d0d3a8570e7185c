pub mod ad_connection;
pub mod ad_search;
pub mod ad_write;
#[cfg(windows)]
pub mod adsi_directory;
pub mod directory;
pub mod ldap_directory;
pub mod ntdsutil;
pub mod prompt;
pub mod reachability;
pub mod tabular;

pub use ad_connection::*;
pub use ad_search::*;
pub use ad_write::*;
pub use directory::*;
pub use ntdsutil::*;
pub use prompt::*;
pub use reachability::*;
