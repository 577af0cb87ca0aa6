pub mod accounts;
pub mod pricing;
pub mod reconciler;
pub mod settlement;

pub use accounts::AccountService;
pub use pricing::{CatalogPriceSource, PriceSource};
pub use reconciler::{CallbackAck, InitiateRequest, InitiateResponse, ReconcilerService};
pub use settlement::{OrderItemRequest, SettlementService};
