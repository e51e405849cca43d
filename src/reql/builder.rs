//! Fluent query construction.
//!
//! Every chain step is `receiver.op(args...)` ==
//! `Term::new(OP).with_arg(receiver).with_args(args)`: the receiver becomes
//! the first argument of a new node and is itself left untouched. Arguments
//! go through the literal conversions in [`super::ast`], so plain Rust values,
//! `serde_json::Value`s, `chrono` timestamps and `bytes::Bytes` can be passed
//! wherever a term is expected.
//!
//! Operators that take a function accept a closure, which is compiled into a
//! `FUNC` term when the operator is built (see [`super::func`]).
//!
//! Options attach to the node an operator produced:
//!
//! ```rust,ignore
//! use rethinkdb_client::r;
//! use serde_json::json;
//!
//! let query = r::table("users")
//!     .insert(json!({"name": "Alice"}))
//!     .with_optarg("conflict", "replace");
//! ```
//!
//! The server is the authority on which operation applies to which kind of
//! value; nothing here checks arity or types.

use super::ast::Term;
use super::datum::Datum;
use super::func::{func1, func2};
use super::terms::TermType;

impl Term {
    fn chain(&self, term_type: TermType) -> Term {
        Term::new(term_type).with_arg(self.clone())
    }

    fn chain1(&self, term_type: TermType, arg: impl Into<Term>) -> Term {
        self.chain(term_type).with_arg(arg)
    }

    fn chain_many<I, T>(&self, term_type: TermType, args: I) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.chain(term_type).with_args(args)
    }

    // Database operations

    pub fn db<S: Into<String>>(name: S) -> Self {
        Term::new(TermType::Db).with_arg(name.into())
    }

    /// `TABLE` at the root, resolved against the connection's default db.
    pub fn table<S: Into<String>>(name: S) -> Self {
        Term::new(TermType::Table).with_arg(name.into())
    }

    /// A table of this database.
    pub fn table_in<S: Into<String>>(&self, name: S) -> Term {
        self.chain1(TermType::Table, name.into())
    }

    pub fn table_create<S: Into<String>>(&self, name: S) -> Term {
        self.chain1(TermType::TableCreate, name.into())
    }

    pub fn table_drop<S: Into<String>>(&self, name: S) -> Term {
        self.chain1(TermType::TableDrop, name.into())
    }

    pub fn table_list(&self) -> Term {
        self.chain(TermType::TableList)
    }

    pub fn config(&self) -> Term {
        self.chain(TermType::Config)
    }

    pub fn status(&self) -> Term {
        self.chain(TermType::Status)
    }

    pub fn wait(&self) -> Term {
        self.chain(TermType::Wait)
    }

    pub fn rebalance(&self) -> Term {
        self.chain(TermType::Rebalance)
    }

    pub fn reconfigure(&self) -> Term {
        self.chain(TermType::Reconfigure)
    }

    // Indexes

    pub fn index_create<S: Into<String>>(&self, name: S) -> Term {
        self.chain1(TermType::IndexCreate, name.into())
    }

    /// Secondary index computed by `f` from each document.
    pub fn index_create_fn<S, F, R>(&self, name: S, f: F) -> Term
    where
        S: Into<String>,
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::IndexCreate, name.into())
            .with_arg(func1(f))
    }

    pub fn index_drop<S: Into<String>>(&self, name: S) -> Term {
        self.chain1(TermType::IndexDrop, name.into())
    }

    pub fn index_list(&self) -> Term {
        self.chain(TermType::IndexList)
    }

    pub fn index_rename<S: Into<String>>(&self, from: S, to: S) -> Term {
        self.chain1(TermType::IndexRename, from.into())
            .with_arg(to.into())
    }

    /// Status of the named indexes, or of all of them when `names` is empty.
    pub fn index_status<I, S>(&self, names: I) -> Term
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chain_many(TermType::IndexStatus, names.into_iter().map(Into::into))
    }

    pub fn index_wait<I, S>(&self, names: I) -> Term
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chain_many(TermType::IndexWait, names.into_iter().map(Into::into))
    }

    // Writes

    pub fn insert(&self, documents: impl Into<Term>) -> Term {
        self.chain1(TermType::Insert, documents)
    }

    pub fn update(&self, changes: impl Into<Term>) -> Term {
        self.chain1(TermType::Update, changes)
    }

    pub fn update_fn<F, R>(&self, f: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::Update, func1(f))
    }

    pub fn replace(&self, document: impl Into<Term>) -> Term {
        self.chain1(TermType::Replace, document)
    }

    pub fn replace_fn<F, R>(&self, f: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::Replace, func1(f))
    }

    pub fn delete(&self) -> Term {
        self.chain(TermType::Delete)
    }

    pub fn sync(&self) -> Term {
        self.chain(TermType::Sync)
    }

    // Selecting data

    pub fn get(&self, key: impl Into<Term>) -> Term {
        self.chain1(TermType::Get, key)
    }

    pub fn get_all<I, T>(&self, keys: I) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.chain_many(TermType::GetAll, keys)
    }

    pub fn between(&self, lower: impl Into<Term>, upper: impl Into<Term>) -> Term {
        self.chain1(TermType::Between, lower).with_arg(upper)
    }

    /// Keep the rows for which `predicate` returns true.
    pub fn filter<F, R>(&self, predicate: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::Filter, func1(predicate))
    }

    /// Filter by an object pattern or an expression over `r::row()`.
    pub fn filter_by(&self, predicate: impl Into<Term>) -> Term {
        self.chain1(TermType::Filter, predicate)
    }

    // Joins

    pub fn inner_join<F, R>(&self, other: impl Into<Term>, predicate: F) -> Term
    where
        F: FnOnce(Term, Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::InnerJoin, other).with_arg(func2(predicate))
    }

    pub fn outer_join<F, R>(&self, other: impl Into<Term>, predicate: F) -> Term
    where
        F: FnOnce(Term, Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::OuterJoin, other).with_arg(func2(predicate))
    }

    pub fn eq_join(&self, key: impl Into<Term>, other: impl Into<Term>) -> Term {
        self.chain1(TermType::EqJoin, key).with_arg(other)
    }

    pub fn zip(&self) -> Term {
        self.chain(TermType::Zip)
    }

    // Transformations

    pub fn map<F, R>(&self, f: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::Map, func1(f))
    }

    pub fn concat_map<F, R>(&self, f: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::ConcatMap, func1(f))
    }

    pub fn with_fields<I, T>(&self, fields: I) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.chain_many(TermType::WithFields, fields)
    }

    /// Sort by field names, `r::asc`/`r::desc` wrappers or expressions.
    pub fn order_by<I, T>(&self, keys: I) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.chain_many(TermType::OrderBy, keys)
    }

    pub fn skip(&self, n: impl Into<Term>) -> Term {
        self.chain1(TermType::Skip, n)
    }

    pub fn limit(&self, n: impl Into<Term>) -> Term {
        self.chain1(TermType::Limit, n)
    }

    pub fn slice(&self, start: impl Into<Term>, end: impl Into<Term>) -> Term {
        self.chain1(TermType::Slice, start).with_arg(end)
    }

    pub fn nth(&self, index: impl Into<Term>) -> Term {
        self.chain1(TermType::Nth, index)
    }

    pub fn offsets_of(&self, value: impl Into<Term>) -> Term {
        self.chain1(TermType::OffsetsOf, value)
    }

    pub fn is_empty(&self) -> Term {
        self.chain(TermType::IsEmpty)
    }

    pub fn union(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Union, other)
    }

    pub fn sample(&self, n: impl Into<Term>) -> Term {
        self.chain1(TermType::Sample, n)
    }

    // Aggregation

    pub fn reduce<F, R>(&self, f: F) -> Term
    where
        F: FnOnce(Term, Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::Reduce, func2(f))
    }

    pub fn fold<F, R>(&self, base: impl Into<Term>, f: F) -> Term
    where
        F: FnOnce(Term, Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::Fold, base).with_arg(func2(f))
    }

    pub fn count(&self) -> Term {
        self.chain(TermType::Count)
    }

    /// Count the elements equal to `value`.
    pub fn count_of(&self, value: impl Into<Term>) -> Term {
        self.chain1(TermType::Count, value)
    }

    pub fn sum(&self) -> Term {
        self.chain(TermType::Sum)
    }

    pub fn sum_by(&self, field: impl Into<Term>) -> Term {
        self.chain1(TermType::Sum, field)
    }

    pub fn avg(&self) -> Term {
        self.chain(TermType::Avg)
    }

    pub fn avg_by(&self, field: impl Into<Term>) -> Term {
        self.chain1(TermType::Avg, field)
    }

    pub fn min(&self) -> Term {
        self.chain(TermType::Min)
    }

    pub fn min_by(&self, field: impl Into<Term>) -> Term {
        self.chain1(TermType::Min, field)
    }

    pub fn max(&self) -> Term {
        self.chain(TermType::Max)
    }

    pub fn max_by(&self, field: impl Into<Term>) -> Term {
        self.chain1(TermType::Max, field)
    }

    pub fn distinct(&self) -> Term {
        self.chain(TermType::Distinct)
    }

    pub fn group(&self, field: impl Into<Term>) -> Term {
        self.chain1(TermType::Group, field)
    }

    pub fn group_fn<F, R>(&self, f: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::Group, func1(f))
    }

    pub fn ungroup(&self) -> Term {
        self.chain(TermType::Ungroup)
    }

    pub fn contains(&self, value: impl Into<Term>) -> Term {
        self.chain1(TermType::Contains, value)
    }

    pub fn contains_fn<F, R>(&self, predicate: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::Contains, func1(predicate))
    }

    // Documents

    /// `GET_FIELD`: the value of one field.
    pub fn get_field<S: Into<String>>(&self, name: S) -> Term {
        self.chain1(TermType::GetField, name.into())
    }

    /// Alias of [`Term::get_field`].
    pub fn field<S: Into<String>>(&self, name: S) -> Term {
        self.get_field(name)
    }

    /// `BRACKET`: a field of an object or an element of an array.
    pub fn bracket(&self, key: impl Into<Term>) -> Term {
        self.chain1(TermType::Bracket, key)
    }

    pub fn pluck<I, T>(&self, fields: I) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.chain_many(TermType::Pluck, fields)
    }

    pub fn without<I, T>(&self, fields: I) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.chain_many(TermType::Without, fields)
    }

    pub fn merge(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Merge, other)
    }

    pub fn merge_fn<F, R>(&self, f: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::Merge, func1(f))
    }

    pub fn has_fields<I, T>(&self, fields: I) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.chain_many(TermType::HasFields, fields)
    }

    pub fn keys(&self) -> Term {
        self.chain(TermType::Keys)
    }

    pub fn values(&self) -> Term {
        self.chain(TermType::Values)
    }

    pub fn append(&self, value: impl Into<Term>) -> Term {
        self.chain1(TermType::Append, value)
    }

    pub fn prepend(&self, value: impl Into<Term>) -> Term {
        self.chain1(TermType::Prepend, value)
    }

    pub fn difference(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Difference, other)
    }

    pub fn set_insert(&self, value: impl Into<Term>) -> Term {
        self.chain1(TermType::SetInsert, value)
    }

    pub fn set_union(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::SetUnion, other)
    }

    pub fn set_intersection(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::SetIntersection, other)
    }

    pub fn set_difference(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::SetDifference, other)
    }

    pub fn insert_at(&self, index: impl Into<Term>, value: impl Into<Term>) -> Term {
        self.chain1(TermType::InsertAt, index).with_arg(value)
    }

    pub fn splice_at(&self, index: impl Into<Term>, values: impl Into<Term>) -> Term {
        self.chain1(TermType::SpliceAt, index).with_arg(values)
    }

    pub fn delete_at(&self, index: impl Into<Term>) -> Term {
        self.chain1(TermType::DeleteAt, index)
    }

    pub fn change_at(&self, index: impl Into<Term>, value: impl Into<Term>) -> Term {
        self.chain1(TermType::ChangeAt, index).with_arg(value)
    }

    // Comparison and logic

    pub fn eq(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Eq, other)
    }

    pub fn ne(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Ne, other)
    }

    pub fn gt(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Gt, other)
    }

    pub fn ge(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Ge, other)
    }

    pub fn lt(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Lt, other)
    }

    pub fn le(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Le, other)
    }

    pub fn not(&self) -> Term {
        self.chain(TermType::Not)
    }

    pub fn and(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::And, other)
    }

    pub fn or(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Or, other)
    }

    // Math

    pub fn add(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Add, other)
    }

    pub fn sub(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Sub, other)
    }

    pub fn mul(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Mul, other)
    }

    pub fn div(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Div, other)
    }

    pub fn mod_(&self, other: impl Into<Term>) -> Term {
        self.chain1(TermType::Mod, other)
    }

    pub fn floor(&self) -> Term {
        self.chain(TermType::Floor)
    }

    pub fn ceil(&self) -> Term {
        self.chain(TermType::Ceil)
    }

    pub fn round(&self) -> Term {
        self.chain(TermType::Round)
    }

    // Control flow

    /// Value to use when this expression errors or is null.
    pub fn default(&self, value: impl Into<Term>) -> Term {
        self.chain1(TermType::Default, value)
    }

    /// `FUNCALL`: call `f` with this value.
    pub fn do_<F, R>(&self, f: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        Term::new(TermType::Funcall)
            .with_arg(func1(f))
            .with_arg(self.clone())
    }

    pub fn for_each<F, R>(&self, f: F) -> Term
    where
        F: FnOnce(Term) -> R,
        R: Into<Term>,
    {
        self.chain1(TermType::ForEach, func1(f))
    }

    pub fn changes(&self) -> Term {
        self.chain(TermType::Changes)
    }

    // Types and strings

    pub fn coerce_to<S: Into<String>>(&self, type_name: S) -> Term {
        self.chain1(TermType::CoerceTo, type_name.into())
    }

    pub fn type_of(&self) -> Term {
        self.chain(TermType::TypeOf)
    }

    pub fn info(&self) -> Term {
        self.chain(TermType::Info)
    }

    /// `TO_JSON_STRING`: server-side serialization of the value.
    pub fn to_json_string(&self) -> Term {
        self.chain(TermType::ToJsonString)
    }

    pub fn match_<S: Into<String>>(&self, regex: S) -> Term {
        self.chain1(TermType::Match, regex.into())
    }

    pub fn upcase(&self) -> Term {
        self.chain(TermType::Upcase)
    }

    pub fn downcase(&self) -> Term {
        self.chain(TermType::Downcase)
    }

    /// Split on whitespace.
    pub fn split(&self) -> Term {
        self.chain(TermType::Split)
    }

    pub fn split_on<S: Into<String>>(&self, separator: S) -> Term {
        self.chain1(TermType::Split, separator.into())
    }

    // Time

    pub fn in_timezone<S: Into<String>>(&self, timezone: S) -> Term {
        self.chain1(TermType::InTimezone, timezone.into())
    }

    pub fn during(&self, start: impl Into<Term>, end: impl Into<Term>) -> Term {
        self.chain1(TermType::During, start).with_arg(end)
    }

    pub fn date(&self) -> Term {
        self.chain(TermType::Date)
    }

    pub fn time_of_day(&self) -> Term {
        self.chain(TermType::TimeOfDay)
    }

    pub fn timezone(&self) -> Term {
        self.chain(TermType::Timezone)
    }

    pub fn year(&self) -> Term {
        self.chain(TermType::Year)
    }

    pub fn month(&self) -> Term {
        self.chain(TermType::Month)
    }

    pub fn day(&self) -> Term {
        self.chain(TermType::Day)
    }

    pub fn day_of_week(&self) -> Term {
        self.chain(TermType::DayOfWeek)
    }

    pub fn day_of_year(&self) -> Term {
        self.chain(TermType::DayOfYear)
    }

    pub fn hours(&self) -> Term {
        self.chain(TermType::Hours)
    }

    pub fn minutes(&self) -> Term {
        self.chain(TermType::Minutes)
    }

    pub fn seconds(&self) -> Term {
        self.chain(TermType::Seconds)
    }

    pub fn to_iso8601(&self) -> Term {
        self.chain(TermType::ToIso8601)
    }

    pub fn to_epoch_time(&self) -> Term {
        self.chain(TermType::ToEpochTime)
    }
}

/// Root constructors, the `r.` of other drivers.
pub mod r {
    use super::*;

    pub fn db<S: Into<String>>(name: S) -> Term {
        Term::db(name)
    }

    pub fn db_create<S: Into<String>>(name: S) -> Term {
        Term::new(TermType::DbCreate).with_arg(name.into())
    }

    pub fn db_drop<S: Into<String>>(name: S) -> Term {
        Term::new(TermType::DbDrop).with_arg(name.into())
    }

    pub fn db_list() -> Term {
        Term::new(TermType::DbList)
    }

    pub fn table<S: Into<String>>(name: S) -> Term {
        Term::table(name)
    }

    pub fn table_create<S: Into<String>>(name: S) -> Term {
        Term::new(TermType::TableCreate).with_arg(name.into())
    }

    pub fn table_drop<S: Into<String>>(name: S) -> Term {
        Term::new(TermType::TableDrop).with_arg(name.into())
    }

    pub fn table_list() -> Term {
        Term::new(TermType::TableList)
    }

    /// Wrap a native value as a term.
    pub fn expr(value: impl Into<Term>) -> Term {
        value.into()
    }

    /// The implicit row of the innermost function.
    pub fn row() -> Term {
        Term::new(TermType::ImplicitVar)
    }

    pub fn branch(
        condition: impl Into<Term>,
        if_true: impl Into<Term>,
        if_false: impl Into<Term>,
    ) -> Term {
        Term::new(TermType::Branch)
            .with_arg(condition)
            .with_arg(if_true)
            .with_arg(if_false)
    }

    /// True if any expression is true.
    pub fn any<I, T>(exprs: I) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        Term::new(TermType::Or).with_args(exprs)
    }

    /// True if every expression is true.
    pub fn all<I, T>(exprs: I) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        Term::new(TermType::And).with_args(exprs)
    }

    pub fn asc(key: impl Into<Term>) -> Term {
        Term::new(TermType::Asc).with_arg(key)
    }

    pub fn desc(key: impl Into<Term>) -> Term {
        Term::new(TermType::Desc).with_arg(key)
    }

    /// `FUNCALL` with several arguments.
    pub fn do_with<I, T, F, R>(args: I, f: F) -> Term
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
        F: FnOnce(&[Term]) -> R,
        R: Into<Term>,
    {
        let args: Vec<Term> = args.into_iter().map(Into::into).collect();
        let function = super::super::func::func_n(args.len(), f);
        Term::new(TermType::Funcall).with_arg(function).with_args(args)
    }

    pub fn now() -> Term {
        Term::new(TermType::Now)
    }

    pub fn time(
        year: impl Into<Term>,
        month: impl Into<Term>,
        day: impl Into<Term>,
        timezone: impl Into<Term>,
    ) -> Term {
        Term::new(TermType::Time)
            .with_arg(year)
            .with_arg(month)
            .with_arg(day)
            .with_arg(timezone)
    }

    pub fn epoch_time(seconds: impl Into<Term>) -> Term {
        Term::new(TermType::EpochTime).with_arg(seconds)
    }

    pub fn iso8601<S: Into<String>>(text: S) -> Term {
        Term::new(TermType::Iso8601).with_arg(text.into())
    }

    /// Binary literal, sent as a BINARY pseudo type.
    pub fn binary(data: impl Into<bytes::Bytes>) -> Term {
        Term::datum(Datum::Binary(data.into()))
    }

    pub fn uuid() -> Term {
        Term::new(TermType::Uuid)
    }

    pub fn range(start: impl Into<Term>, end: impl Into<Term>) -> Term {
        Term::new(TermType::Range).with_arg(start).with_arg(end)
    }

    pub fn literal(value: impl Into<Term>) -> Term {
        Term::new(TermType::Literal).with_arg(value)
    }

    pub fn args(array: impl Into<Term>) -> Term {
        Term::new(TermType::Args).with_arg(array)
    }

    pub fn js<S: Into<String>>(code: S) -> Term {
        Term::new(TermType::Javascript).with_arg(code.into())
    }

    pub fn json<S: Into<String>>(text: S) -> Term {
        Term::new(TermType::Json).with_arg(text.into())
    }

    pub fn error<S: Into<String>>(message: S) -> Term {
        Term::new(TermType::Error).with_arg(message.into())
    }

    pub fn random(low: impl Into<Term>, high: impl Into<Term>) -> Term {
        Term::new(TermType::Random).with_arg(low).with_arg(high)
    }

    pub fn minval() -> Term {
        Term::new(TermType::Minval)
    }

    pub fn maxval() -> Term {
        Term::new(TermType::Maxval)
    }
}
