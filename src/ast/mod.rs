use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: &str, line: usize, column: usize) -> Self {
        Self {
            file: file.to_string(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// ── Types ───────────────────────────────────────────────────────────────

/// Source-level types. `Pointer` is `double*`, an address into linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Double,
    Pointer,
    Void,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Double => write!(f, "double"),
            Type::Pointer => write!(f, "double*"),
            Type::Void => write!(f, "void"),
        }
    }
}

// ── Top level ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Program {
    pub loc: SourceLocation,
    pub imports: Vec<ImportDecl>,
    pub globals: Vec<GlobalDecl>,
    pub functions: Vec<FunctionDef>,
}

/// `extern double name(double, ...);`: a function the host provides
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub loc: SourceLocation,
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
}

#[derive(Debug, Clone)]
pub struct GlobalDecl {
    pub loc: SourceLocation,
    pub name: String,
    pub ty: Type,
    pub init: Expr,
    pub exported: bool,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub loc: SourceLocation,
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub loc: SourceLocation,
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body: Vec<Statement>,
    pub exported: bool,
}

// ── Statements ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone)]
pub enum Statement {
    VarDecl {
        loc: SourceLocation,
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    Assign {
        loc: SourceLocation,
        target: String,
        op: AssignOp,
        value: Expr,
    },
    /// `*pointer = value`
    Store {
        loc: SourceLocation,
        pointer: Expr,
        value: Expr,
    },
    /// `name++` / `name--`
    Increment {
        loc: SourceLocation,
        target: String,
        delta: i32,
    },
    If {
        loc: SourceLocation,
        condition: Expr,
        then_body: Vec<Statement>,
        else_body: Option<Vec<Statement>>,
    },
    For {
        loc: SourceLocation,
        init: Option<Box<Statement>>,
        condition: Option<Expr>,
        step: Option<Box<Statement>>,
        body: Vec<Statement>,
    },
    While {
        loc: SourceLocation,
        condition: Expr,
        body: Vec<Statement>,
    },
    Return {
        loc: SourceLocation,
        value: Option<Expr>,
    },
    Expression {
        loc: SourceLocation,
        expr: Expr,
    },
    Block {
        loc: SourceLocation,
        body: Vec<Statement>,
    },
}

impl Statement {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            Statement::VarDecl { loc, .. }
            | Statement::Assign { loc, .. }
            | Statement::Store { loc, .. }
            | Statement::Increment { loc, .. }
            | Statement::If { loc, .. }
            | Statement::For { loc, .. }
            | Statement::While { loc, .. }
            | Statement::Return { loc, .. }
            | Statement::Expression { loc, .. }
            | Statement::Block { loc, .. } => loc,
        }
    }
}

// ── Expressions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntLiteral {
        loc: SourceLocation,
        value: i64,
    },
    FloatLiteral {
        loc: SourceLocation,
        value: f64,
    },
    Identifier {
        loc: SourceLocation,
        name: String,
    },
    Call {
        loc: SourceLocation,
        callee: String,
        arguments: Vec<Expr>,
    },
    Negate {
        loc: SourceLocation,
        operand: Box<Expr>,
    },
    Binary {
        loc: SourceLocation,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Cast {
        loc: SourceLocation,
        ty: Type,
        operand: Box<Expr>,
    },
    /// `*pointer`
    Deref {
        loc: SourceLocation,
        pointer: Box<Expr>,
    },
}

impl Expr {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            Expr::IntLiteral { loc, .. }
            | Expr::FloatLiteral { loc, .. }
            | Expr::Identifier { loc, .. }
            | Expr::Call { loc, .. }
            | Expr::Negate { loc, .. }
            | Expr::Binary { loc, .. }
            | Expr::Cast { loc, .. }
            | Expr::Deref { loc, .. } => loc,
        }
    }
}
