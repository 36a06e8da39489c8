//! Pure order-history analytics. Nothing in here performs I/O.

pub mod health;
pub mod insights;
pub mod intervals;
pub mod policy;
pub mod predictor;
pub mod seasonality;
pub mod stats;

pub use health::{HealthAssessor, HealthPolicy, HealthUpdate};
pub use insights::{ChurnRisk, CustomerInsights, GrowthTrend, InsightsGenerator};
pub use intervals::{IntervalAnalysis, IntervalSeries, TrendDirection, TrendResult};
pub use policy::CadencePolicy;
pub use predictor::{
    CadencePrediction, CadencePredictor, ConfidenceLevel, PredictionFactors, PredictionMethod,
};
pub use seasonality::SeasonalityResult;
