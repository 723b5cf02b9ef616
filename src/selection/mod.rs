//! Feature selection: subsets, rankings and recursive elimination

pub mod generalized;
pub mod rfe;
pub mod subset;

pub use self::generalized::{GeneralizedMethod, GeneralizedRanking};
pub use self::rfe::{
    compute_rank, deletion_count, rank_features, CrossValidatedBlend, LambdaSweep, RankMethod,
    Rfe, RfeRound,
};
pub use self::subset::FeatureSubset;
