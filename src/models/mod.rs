pub mod assessment;
pub mod clinical;
pub mod enums;
pub mod request;

pub use assessment::*;
pub use clinical::*;
pub use enums::*;
pub use request::*;
