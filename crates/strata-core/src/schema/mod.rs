mod operation;
mod table;
mod types;

pub use operation::SchemaOperation;
pub use table::{
    constraint_name, ColumnDef, ForeignKey, IndexDef, IndexKind, ReferentialAction, TableDef,
};
pub use types::SqlType;
