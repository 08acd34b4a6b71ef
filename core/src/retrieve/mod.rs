//! Queries, the retrievers executing them and the operators combining their results.

mod aggregate;
mod correspondence;
mod query;
mod retriever;
mod topk;
mod transform;

pub use aggregate::{Intersection, WeightedScoreFusion};
pub use correspondence::{CorrespondenceFunction, InvalidCorrespondence};
pub use query::{
	BooleanQuery, Comparison, Distance, FulltextQuery, LikePattern, Predicate, ProximityQuery, Query,
	SortOrder,
};
pub use retriever::FieldRetriever;
pub use topk::{BoundedTopK, ZeroCapacity};
pub use transform::{FieldLookup, RelationExpander};
