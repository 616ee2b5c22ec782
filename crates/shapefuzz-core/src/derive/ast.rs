//! Syntax tree of a type-declaration source.
//!
//! Only the constructs that can influence a schema are modeled in detail; type-level
//! programming (conditional, mapped and indexed-access types) is kept as
//! [`TypeExpr::Opaque`].

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Any,
    Unknown,
    Never,
    Number,
    String,
    Boolean,
    Void,
    Undefined,
    Null,
    Object,
    Symbol,
    BigInt,
    This,
}

impl Keyword {
    pub fn from_ident(word: &str) -> Option<Self> {
        Some(match word {
            "any" => Keyword::Any,
            "unknown" => Keyword::Unknown,
            "never" => Keyword::Never,
            "number" => Keyword::Number,
            "string" => Keyword::String,
            "boolean" => Keyword::Boolean,
            "void" => Keyword::Void,
            "undefined" => Keyword::Undefined,
            "null" => Keyword::Null,
            "object" => Keyword::Object,
            "symbol" => Keyword::Symbol,
            "bigint" => Keyword::BigInt,
            "this" => Keyword::This,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Keyword(Keyword),
    StringLit(String),
    NumberLit(f64),
    BoolLit(bool),
    TemplateLit,
    /// Possibly qualified reference with type arguments: `A.B<C>`.
    Ref {
        name: Vec<String>,
        args: Vec<TypeExpr>,
    },
    Array(Box<TypeExpr>),
    Tuple(Vec<TupleElement>),
    Union(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
    /// Function or constructor type.
    Function(Box<FnSig>),
    Object(Vec<Member>),
    /// `typeof a.b`
    Query(Vec<String>),
    Keyof(Box<TypeExpr>),
    /// Type predicate `x is T` in return position.
    Predicate,
    Opaque,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleElement {
    pub ty: TypeExpr,
    pub optional: bool,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub name: String,
    pub constraint: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub optional: bool,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FnSig {
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub is_static: bool,
    /// `private`, `protected` or a `#name`.
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Property {
        name: String,
        optional: bool,
        ty: Option<TypeExpr>,
        modifiers: Modifiers,
    },
    Method {
        name: String,
        optional: bool,
        sig: FnSig,
        modifiers: Modifiers,
    },
    /// Class constructor or construct signature.
    Constructor(FnSig),
    /// Call signature of a callable interface.
    Call(FnSig),
    Index {
        value: TypeExpr,
        modifiers: Modifiers,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub extends: Option<TypeExpr>,
    pub implements: Vec<TypeExpr>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub extends: Vec<TypeExpr>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnumValue {
    Number,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<(String, EnumValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Function { name: String, sig: FnSig },
    Class(ClassDecl),
    Interface(InterfaceDecl),
    TypeAlias(TypeAliasDecl),
    Enum(EnumDecl),
    Variable { name: String, ty: Option<TypeExpr> },
    Namespace { name: String, body: Vec<Statement> },
    /// `declare module "specifier" { ... }`
    AmbientModule { specifier: String, body: Vec<Statement> },
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Function { name, .. }
            | Decl::Variable { name, .. }
            | Decl::Namespace { name, .. } => name,
            Decl::Class(c) => &c.name,
            Decl::Interface(i) => &i.name,
            Decl::TypeAlias(a) => &a.name,
            Decl::Enum(e) => &e.name,
            Decl::AmbientModule { specifier, .. } => specifier,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Decl { decl: Decl, exported: bool },
    /// `export = name;`
    ExportAssignment(Vec<String>),
    /// `export { a, b as c };` Re-exports from other files carry `from`.
    ExportList {
        specifiers: Vec<ExportSpecifier>,
        from: Option<String>,
    },
    /// Imports, `export * from`, `export as namespace`, `declare global`.
    Other,
}

impl Statement {
    /// Whether the statement uses explicit export syntax.
    pub fn is_export(&self) -> bool {
        match self {
            Statement::Decl { exported, .. } => *exported,
            Statement::ExportAssignment(_) | Statement::ExportList { .. } => true,
            Statement::Other => false,
        }
    }
}
