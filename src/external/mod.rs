pub mod alphavantage;
pub mod mock_provider;
pub mod price_provider;

pub use price_provider::{OhlcvPoint, PriceProvider, PriceProviderError};
