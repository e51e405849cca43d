//! Function literals.
//!
//! A closure passed to `map`, `filter`, `reduce` and friends is compiled into
//! a `FUNC` term:
//!
//! ```json
//! [69, [[2, [7]], <body>]]
//! ```
//!
//! where `7` is a bound variable id and `<body>` refers to it as `[10, [7]]`.
//! Ids come from a process-wide counter and are allocated each time an
//! operator consumes a closure, so nested functions (even two uses of the
//! same closure value) never share a variable.

use super::ast::Term;
use super::terms::TermType;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh bound-variable id.
pub fn next_var_id() -> u64 {
    NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed)
}

/// A `VAR` term referring to bound variable `id`.
pub fn var(id: u64) -> Term {
    Term::new(TermType::Var).with_arg(id)
}

/// Wrap `body` as a function of the variables `ids`.
pub fn func(ids: &[u64], body: Term) -> Term {
    Term::new(TermType::Func)
        .with_arg(Term::new(TermType::MakeArray).with_args(ids.iter().copied()))
        .with_arg(body)
}

/// Compile a one-argument closure.
pub fn func1<F, R>(f: F) -> Term
where
    F: FnOnce(Term) -> R,
    R: Into<Term>,
{
    let id = next_var_id();
    let body = f(var(id)).into();
    func(&[id], body)
}

/// Compile a two-argument closure.
pub fn func2<F, R>(f: F) -> Term
where
    F: FnOnce(Term, Term) -> R,
    R: Into<Term>,
{
    let a = next_var_id();
    let b = next_var_id();
    let body = f(var(a), var(b)).into();
    func(&[a, b], body)
}

/// Compile a closure over any number of arguments given as a slice.
pub fn func_n<F, R>(arity: usize, f: F) -> Term
where
    F: FnOnce(&[Term]) -> R,
    R: Into<Term>,
{
    let ids: Vec<u64> = (0..arity).map(|_| next_var_id()).collect();
    let vars: Vec<Term> = ids.iter().copied().map(var).collect();
    let body = f(&vars).into();
    func(&ids, body)
}

/// The variable ids a compiled `FUNC` term binds.
pub fn bound_ids(term: &Term) -> Option<Vec<u64>> {
    if term.term_type != TermType::Func {
        return None;
    }
    let params = term.first_arg()?;
    params
        .args
        .iter()
        .map(|id| id.as_datum()?.as_number().map(|n| n as u64))
        .collect()
}
