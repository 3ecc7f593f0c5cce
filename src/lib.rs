pub mod boleto;
pub mod client;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod grouping;
pub mod interest;
pub mod schedule;
pub mod service;
pub mod session;
pub mod state;
pub mod status;
pub mod store;
pub mod types;
pub mod views;

// re-export key types
pub use boleto::{
    BankApiResponse, BankBoletoStrategy, BankStrategies, BankType, Boleto, BoletoId, BoletoRequest,
    BoletoStatus, MockBoletoStrategy,
};
pub use client::{Client, ClientUpdate, NewClient};
pub use config::EngineConfig;
pub use decimal::{Money, Rate};
pub use errors::{BillingError, ErrorResponse, Result};
pub use events::{BillingEvent, EventStore};
pub use grouping::{BillingPeriod, GroupingService, PaymentFilter, PaymentGrouping};
pub use interest::{LateFee, OverdueCalculation, OverdueCalculator};
pub use schedule::{GeneratedSchedule, NewPaymentGroup, ScheduleGenerator};
pub use service::BillingService;
pub use session::SessionContext;
pub use state::{OverdueTerms, Payment, PaymentGroup};
pub use status::{PaymentCorrection, PaymentStatusResolver, Settlement};
pub use store::{BillingStore, InMemoryStore};
pub use types::{ClientId, Document, DocumentKind, PaymentGroupId, PaymentId, PaymentStatus};
pub use views::{BoletoView, ClientView, GroupedPaymentView, PaymentGroupView, PaymentView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
