//! Filter expressions and proximity search over map features.
//!
//! ```
//! use mapquery::context::Context;
//! use mapquery::dsl::parse_expression;
//! use mapquery::value::Value;
//!
//! let expr = parse_expression("type = 'road' AND maxspeed > 50").unwrap();
//! let props = Value::from_json_str(r#"{"type": "road", "maxspeed": 80}"#).unwrap();
//! assert!(expr.evaluate(&props));
//! assert_eq!(props.lookup("maxspeed"), Some(Value::Int(80)));
//! ```

pub mod app;
pub mod config;
pub mod context;
pub mod dsl;
pub mod error;
pub mod geometry;
pub mod search;
pub mod sinks;
pub mod sources;
pub mod style;
pub mod value;

pub use error::{GeometryError, ParseError, SearchError};
