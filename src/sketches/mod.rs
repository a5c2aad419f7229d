mod cardinality;
mod quantile;
mod rate;
mod topn;

pub use cardinality::Cardinality;
pub use quantile::Quantile;
pub use rate::Rate;
pub use topn::TopN;
