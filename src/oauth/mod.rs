pub mod callback_server;
pub mod exchange;
pub mod flow;
pub mod state;
pub mod types;

pub use callback_server::CallbackListener;
pub use exchange::{ExchangeParams, TokenExchanger};
pub use flow::{AuthorizationFlow, AuthorizationOutcome, BrowserOpener, NoBrowser, SystemBrowser};
pub use types::{AuthorizationCode, AuthorizationRequest, TokenResponse};
