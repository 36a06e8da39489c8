pub mod analytics;
pub mod batch;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod history;

pub use analytics::{
    CadencePolicy, CadencePrediction, ChurnRisk, ConfidenceLevel, CustomerInsights, GrowthTrend,
    HealthPolicy, HealthUpdate, PredictionMethod, TrendDirection,
};
pub use batch::{
    batch_update_predictions, run_health_assessment, BatchOptions, BatchSummary,
    HealthAssessmentSummary,
};
pub use domain::customer::{CustomerId, CustomerProfile, RiskStatus, TenantId};
pub use domain::order::{OrderHistory, OrderRecord};
pub use engine::{CadenceEngine, Clock, FixedClock, SystemClock};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use history::{CustomerDirectory, CustomerFilter, OrderHistoryAccessor};
