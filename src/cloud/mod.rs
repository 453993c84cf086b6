mod traits;
mod tuya;

pub use traits::{CloudApi, Credentials, TokenSet};
pub use tuya::TuyaClient;
