//! ReQL term types.
//!
//! Every query operation is identified on the wire by a numeric opcode.
//! The discriminants below are the server's `ql2.proto` `Term.TermType`
//! values; a query encoded with any other number is rejected by the server.
//!
//! # Term Categories
//!
//! - **Core Data**: DATUM, MAKE_ARRAY, MAKE_OBJ, VAR, IMPLICIT_VAR
//! - **Database / Table Admin**: DB, DB_CREATE, TABLE, TABLE_CREATE, INDEX_*
//! - **Data Access**: GET, GET_ALL, BETWEEN
//! - **Transformations**: FILTER, MAP, CONCAT_MAP, ORDER_BY, DISTINCT
//! - **Aggregations**: COUNT, SUM, AVG, MIN, MAX, GROUP, REDUCE
//! - **Writes**: INSERT, UPDATE, REPLACE, DELETE, SYNC
//! - **Control Flow**: BRANCH, FOR_EACH, FUNC, FUNCALL
//! - **Time**: NOW, TIME, EPOCH_TIME, ISO8601 and the date accessors
//!
//! # Example
//!
//! ```rust,ignore
//! use rethinkdb_client::reql::TermType;
//!
//! let term_type = TermType::from_u64(38).unwrap();
//! assert_eq!(term_type, TermType::Map);
//! assert_eq!(term_type.name(), "MAP");
//! ```

use serde::{Deserialize, Serialize};

macro_rules! term_types {
    ($($variant:ident = $value:literal => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u64)]
        pub enum TermType {
            $($variant = $value,)*
        }

        impl TermType {
            /// Converts from a wire opcode, `None` if the opcode is unknown.
            pub fn from_u64(value: u64) -> Option<Self> {
                match value {
                    $($value => Some(TermType::$variant),)*
                    _ => None,
                }
            }

            /// Returns the uppercase protocol name (e.g. "FILTER", "MAP").
            pub fn name(&self) -> &'static str {
                match self {
                    $(TermType::$variant => $name,)*
                }
            }
        }
    };
}

term_types! {
    // Core data
    Datum = 1 => "DATUM",
    MakeArray = 2 => "MAKE_ARRAY",
    MakeObj = 3 => "MAKE_OBJ",
    Var = 10 => "VAR",
    Javascript = 11 => "JAVASCRIPT",
    Error = 12 => "ERROR",
    ImplicitVar = 13 => "IMPLICIT_VAR",
    Uuid = 169 => "UUID",
    Http = 153 => "HTTP",

    // Databases and tables
    Db = 14 => "DB",
    Table = 15 => "TABLE",
    Get = 16 => "GET",
    GetAll = 78 => "GET_ALL",

    // Comparison
    Eq = 17 => "EQ",
    Ne = 18 => "NE",
    Lt = 19 => "LT",
    Le = 20 => "LE",
    Gt = 21 => "GT",
    Ge = 22 => "GE",
    Not = 23 => "NOT",

    // Math
    Add = 24 => "ADD",
    Sub = 25 => "SUB",
    Mul = 26 => "MUL",
    Div = 27 => "DIV",
    Mod = 28 => "MOD",
    Floor = 183 => "FLOOR",
    Ceil = 184 => "CEIL",
    Round = 185 => "ROUND",

    // Arrays and sets
    Append = 29 => "APPEND",
    Prepend = 80 => "PREPEND",
    Difference = 95 => "DIFFERENCE",
    SetInsert = 88 => "SET_INSERT",
    SetIntersection = 89 => "SET_INTERSECTION",
    SetUnion = 90 => "SET_UNION",
    SetDifference = 91 => "SET_DIFFERENCE",
    Slice = 30 => "SLICE",
    Skip = 70 => "SKIP",
    Limit = 71 => "LIMIT",
    OffsetsOf = 87 => "OFFSETS_OF",
    Contains = 93 => "CONTAINS",

    // Objects
    GetField = 31 => "GET_FIELD",
    Keys = 94 => "KEYS",
    Values = 186 => "VALUES",
    Object = 143 => "OBJECT",
    HasFields = 32 => "HAS_FIELDS",
    WithFields = 96 => "WITH_FIELDS",
    Pluck = 33 => "PLUCK",
    Without = 34 => "WITHOUT",
    Merge = 35 => "MERGE",
    Literal = 137 => "LITERAL",

    // Sequences
    Between = 182 => "BETWEEN",
    Reduce = 37 => "REDUCE",
    Map = 38 => "MAP",
    Fold = 187 => "FOLD",
    Filter = 39 => "FILTER",
    ConcatMap = 40 => "CONCAT_MAP",
    OrderBy = 41 => "ORDER_BY",
    Distinct = 42 => "DISTINCT",
    Count = 43 => "COUNT",
    IsEmpty = 86 => "IS_EMPTY",
    Union = 44 => "UNION",
    Nth = 45 => "NTH",
    Bracket = 170 => "BRACKET",
    InnerJoin = 48 => "INNER_JOIN",
    OuterJoin = 49 => "OUTER_JOIN",
    EqJoin = 50 => "EQ_JOIN",
    Zip = 72 => "ZIP",
    Range = 173 => "RANGE",
    Sample = 81 => "SAMPLE",
    InsertAt = 82 => "INSERT_AT",
    DeleteAt = 83 => "DELETE_AT",
    ChangeAt = 84 => "CHANGE_AT",
    SpliceAt = 85 => "SPLICE_AT",

    // Types
    CoerceTo = 51 => "COERCE_TO",
    TypeOf = 52 => "TYPE_OF",
    Info = 79 => "INFO",
    Default = 92 => "DEFAULT",
    Json = 98 => "JSON",
    ToJsonString = 172 => "TO_JSON_STRING",

    // Writes
    Update = 53 => "UPDATE",
    Delete = 54 => "DELETE",
    Replace = 55 => "REPLACE",
    Insert = 56 => "INSERT",
    Sync = 138 => "SYNC",

    // Administration
    DbCreate = 57 => "DB_CREATE",
    DbDrop = 58 => "DB_DROP",
    DbList = 59 => "DB_LIST",
    TableCreate = 60 => "TABLE_CREATE",
    TableDrop = 61 => "TABLE_DROP",
    TableList = 62 => "TABLE_LIST",
    Config = 174 => "CONFIG",
    Status = 175 => "STATUS",
    Wait = 177 => "WAIT",
    Reconfigure = 176 => "RECONFIGURE",
    Rebalance = 179 => "REBALANCE",
    Grant = 188 => "GRANT",
    IndexCreate = 75 => "INDEX_CREATE",
    IndexDrop = 76 => "INDEX_DROP",
    IndexList = 77 => "INDEX_LIST",
    IndexStatus = 139 => "INDEX_STATUS",
    IndexWait = 140 => "INDEX_WAIT",
    IndexRename = 156 => "INDEX_RENAME",

    // Control flow
    Funcall = 64 => "FUNCALL",
    Branch = 65 => "BRANCH",
    Or = 66 => "OR",
    And = 67 => "AND",
    ForEach = 68 => "FOR_EACH",
    Func = 69 => "FUNC",
    Asc = 73 => "ASC",
    Desc = 74 => "DESC",

    // Strings
    Match = 97 => "MATCH",
    Upcase = 141 => "UPCASE",
    Downcase = 142 => "DOWNCASE",
    Split = 149 => "SPLIT",

    // Time
    Iso8601 = 99 => "ISO8601",
    ToIso8601 = 100 => "TO_ISO8601",
    EpochTime = 101 => "EPOCH_TIME",
    ToEpochTime = 102 => "TO_EPOCH_TIME",
    Now = 103 => "NOW",
    InTimezone = 104 => "IN_TIMEZONE",
    During = 105 => "DURING",
    Date = 106 => "DATE",
    TimeOfDay = 126 => "TIME_OF_DAY",
    Timezone = 127 => "TIMEZONE",
    Year = 128 => "YEAR",
    Month = 129 => "MONTH",
    Day = 130 => "DAY",
    DayOfWeek = 131 => "DAY_OF_WEEK",
    DayOfYear = 132 => "DAY_OF_YEAR",
    Hours = 133 => "HOURS",
    Minutes = 134 => "MINUTES",
    Seconds = 135 => "SECONDS",
    Time = 136 => "TIME",
    Monday = 107 => "MONDAY",
    Tuesday = 108 => "TUESDAY",
    Wednesday = 109 => "WEDNESDAY",
    Thursday = 110 => "THURSDAY",
    Friday = 111 => "FRIDAY",
    Saturday = 112 => "SATURDAY",
    Sunday = 113 => "SUNDAY",
    January = 114 => "JANUARY",
    February = 115 => "FEBRUARY",
    March = 116 => "MARCH",
    April = 117 => "APRIL",
    May = 118 => "MAY",
    June = 119 => "JUNE",
    July = 120 => "JULY",
    August = 121 => "AUGUST",
    September = 122 => "SEPTEMBER",
    October = 123 => "OCTOBER",
    November = 124 => "NOVEMBER",
    December = 125 => "DECEMBER",

    // Grouping and aggregation
    Group = 144 => "GROUP",
    Sum = 145 => "SUM",
    Avg = 146 => "AVG",
    Min = 147 => "MIN",
    Max = 148 => "MAX",
    Ungroup = 150 => "UNGROUP",

    // Misc
    Random = 151 => "RANDOM",
    Changes = 152 => "CHANGES",
    Args = 154 => "ARGS",
    Binary = 155 => "BINARY",
    Minval = 180 => "MINVAL",
    Maxval = 181 => "MAXVAL",
}

impl TermType {
    /// Converts to the wire opcode.
    ///
    /// ```rust,ignore
    /// assert_eq!(TermType::Filter.to_u64(), 39);
    /// ```
    pub fn to_u64(self) -> u64 {
        self as u64
    }
}

impl std::fmt::Display for TermType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
