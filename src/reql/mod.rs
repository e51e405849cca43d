//! ReQL (RethinkDB Query Language) on the client side.
//!
//! This module turns chained method calls into the query tree the server
//! evaluates:
//!
//! - **Term Types**: the protocol's opcode table (DB, TABLE, FILTER, MAP, ...)
//! - **AST**: `Term` nodes and their wire JSON rendering
//! - **Builder**: the fluent chain methods and the `r` root constructors
//! - **Functions**: closure compilation into `FUNC` terms
//! - **Datum**: the value model, including TIME, BINARY and GROUPED_DATA
//!
//! # Example
//!
//! ```rust,ignore
//! use rethinkdb_client::r;
//!
//! // r.table("users").filter(row => row("age").gt(18))
//! let query = r::table("users").filter(|row| row.get_field("age").gt(18));
//! println!("{}", query);
//! ```

pub mod ast;
pub mod builder;
pub mod datum;
pub mod func;
pub mod terms;
pub mod types;

pub use ast::Term;
pub use builder::r;
pub use datum::{Datum, ReqlTime};
pub use terms::TermType;
pub use types::*;
