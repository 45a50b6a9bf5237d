mod block;
mod class;
mod instance;
mod invokable;
mod lookup;
mod method;
mod scope;
mod shape;
mod symbol;
mod value;

pub use block::{Block, Context};
pub use class::Class;
pub use instance::Instance;
pub use invokable::{Invokable, Primitive};
pub use lookup::{CacheEntry, InlineCache, lookup};
pub use method::{BackEdge, EdgeState, Method, MethodDesc, MethodId, Site};
pub use scope::{LexicalScope, VarAccess, VarKind, VarLocation};
pub use shape::{FieldKind, Shape, StorageLocation};
pub use symbol::{Symbol, SymbolId, SymbolTable};
pub use value::Value;
