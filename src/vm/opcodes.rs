//! Instruction set: the WebAssembly subset the compiler emits

use std::fmt;

/// Value types of the stack machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValType {
    I32,
    F64,
}

impl ValType {
    pub fn byte(self) -> u8 {
        match self {
            ValType::I32 => 0x7f,
            ValType::F64 => 0x7c,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x7f => Some(ValType::I32),
            0x7c => Some(ValType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValType::I32 => write!(f, "i32"),
            ValType::F64 => write!(f, "f64"),
        }
    }
}

/// Result type of a structured block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(ValType),
}

impl BlockType {
    pub fn arity(self) -> usize {
        match self {
            BlockType::Empty => 0,
            BlockType::Value(_) => 1,
        }
    }
}

/// Immediate of load/store instructions. `align` is the log2 exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    pub align: u32,
    pub offset: u32,
}

impl MemArg {
    pub const F64: MemArg = MemArg { align: 3, offset: 0 };
    pub const I32: MemArg = MemArg { align: 2, offset: 0 };
}

/// Stack machine instructions.
///
/// All operands are Copy so instructions can be copied out of the code
/// vector during dispatch. Branch depths are relative label indices, as in
/// the binary format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    // ── Control ──────────────────────────────────────────────────────
    Unreachable,
    Nop,
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    /// Branch to the label `depth` levels out
    Br(u32),
    /// Pop i32; branch if non-zero
    BrIf(u32),
    Return,
    Call(u32),

    // ── Parametric ───────────────────────────────────────────────────
    Drop,

    // ── Variables ────────────────────────────────────────────────────
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    // ── Memory ───────────────────────────────────────────────────────
    I32Load(MemArg),
    F64Load(MemArg),
    I32Store(MemArg),
    F64Store(MemArg),

    // ── Constants ────────────────────────────────────────────────────
    I32Const(i32),
    F64Const(f64),

    // ── Comparison ───────────────────────────────────────────────────
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32GtS,
    I32LeS,
    I32GeS,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,

    // ── Arithmetic ───────────────────────────────────────────────────
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    F64Neg,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,

    // ── Conversion ───────────────────────────────────────────────────
    I32TruncF64S,
    F64ConvertI32S,
}

// Opcode bytes from the binary format
pub const OP_UNREACHABLE: u8 = 0x00;
pub const OP_NOP: u8 = 0x01;
pub const OP_BLOCK: u8 = 0x02;
pub const OP_LOOP: u8 = 0x03;
pub const OP_IF: u8 = 0x04;
pub const OP_ELSE: u8 = 0x05;
pub const OP_END: u8 = 0x0b;
pub const OP_BR: u8 = 0x0c;
pub const OP_BR_IF: u8 = 0x0d;
pub const OP_RETURN: u8 = 0x0f;
pub const OP_CALL: u8 = 0x10;
pub const OP_DROP: u8 = 0x1a;
pub const OP_LOCAL_GET: u8 = 0x20;
pub const OP_LOCAL_SET: u8 = 0x21;
pub const OP_LOCAL_TEE: u8 = 0x22;
pub const OP_GLOBAL_GET: u8 = 0x23;
pub const OP_GLOBAL_SET: u8 = 0x24;
pub const OP_I32_LOAD: u8 = 0x28;
pub const OP_F64_LOAD: u8 = 0x2b;
pub const OP_I32_STORE: u8 = 0x36;
pub const OP_F64_STORE: u8 = 0x39;
pub const OP_I32_CONST: u8 = 0x41;
pub const OP_F64_CONST: u8 = 0x44;
pub const OP_I32_EQZ: u8 = 0x45;
pub const OP_I32_EQ: u8 = 0x46;
pub const OP_I32_NE: u8 = 0x47;
pub const OP_I32_LT_S: u8 = 0x48;
pub const OP_I32_GT_S: u8 = 0x4a;
pub const OP_I32_LE_S: u8 = 0x4c;
pub const OP_I32_GE_S: u8 = 0x4e;
pub const OP_F64_EQ: u8 = 0x61;
pub const OP_F64_NE: u8 = 0x62;
pub const OP_F64_LT: u8 = 0x63;
pub const OP_F64_GT: u8 = 0x64;
pub const OP_F64_LE: u8 = 0x65;
pub const OP_F64_GE: u8 = 0x66;
pub const OP_I32_ADD: u8 = 0x6a;
pub const OP_I32_SUB: u8 = 0x6b;
pub const OP_I32_MUL: u8 = 0x6c;
pub const OP_I32_DIV_S: u8 = 0x6d;
pub const OP_F64_NEG: u8 = 0x9a;
pub const OP_F64_ADD: u8 = 0xa0;
pub const OP_F64_SUB: u8 = 0xa1;
pub const OP_F64_MUL: u8 = 0xa2;
pub const OP_F64_DIV: u8 = 0xa3;
pub const OP_I32_TRUNC_F64_S: u8 = 0xaa;
pub const OP_F64_CONVERT_I32_S: u8 = 0xb7;

impl Instruction {
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Unreachable => OP_UNREACHABLE,
            Instruction::Nop => OP_NOP,
            Instruction::Block(_) => OP_BLOCK,
            Instruction::Loop(_) => OP_LOOP,
            Instruction::If(_) => OP_IF,
            Instruction::Else => OP_ELSE,
            Instruction::End => OP_END,
            Instruction::Br(_) => OP_BR,
            Instruction::BrIf(_) => OP_BR_IF,
            Instruction::Return => OP_RETURN,
            Instruction::Call(_) => OP_CALL,
            Instruction::Drop => OP_DROP,
            Instruction::LocalGet(_) => OP_LOCAL_GET,
            Instruction::LocalSet(_) => OP_LOCAL_SET,
            Instruction::LocalTee(_) => OP_LOCAL_TEE,
            Instruction::GlobalGet(_) => OP_GLOBAL_GET,
            Instruction::GlobalSet(_) => OP_GLOBAL_SET,
            Instruction::I32Load(_) => OP_I32_LOAD,
            Instruction::F64Load(_) => OP_F64_LOAD,
            Instruction::I32Store(_) => OP_I32_STORE,
            Instruction::F64Store(_) => OP_F64_STORE,
            Instruction::I32Const(_) => OP_I32_CONST,
            Instruction::F64Const(_) => OP_F64_CONST,
            Instruction::I32Eqz => OP_I32_EQZ,
            Instruction::I32Eq => OP_I32_EQ,
            Instruction::I32Ne => OP_I32_NE,
            Instruction::I32LtS => OP_I32_LT_S,
            Instruction::I32GtS => OP_I32_GT_S,
            Instruction::I32LeS => OP_I32_LE_S,
            Instruction::I32GeS => OP_I32_GE_S,
            Instruction::F64Eq => OP_F64_EQ,
            Instruction::F64Ne => OP_F64_NE,
            Instruction::F64Lt => OP_F64_LT,
            Instruction::F64Gt => OP_F64_GT,
            Instruction::F64Le => OP_F64_LE,
            Instruction::F64Ge => OP_F64_GE,
            Instruction::I32Add => OP_I32_ADD,
            Instruction::I32Sub => OP_I32_SUB,
            Instruction::I32Mul => OP_I32_MUL,
            Instruction::I32DivS => OP_I32_DIV_S,
            Instruction::F64Neg => OP_F64_NEG,
            Instruction::F64Add => OP_F64_ADD,
            Instruction::F64Sub => OP_F64_SUB,
            Instruction::F64Mul => OP_F64_MUL,
            Instruction::F64Div => OP_F64_DIV,
            Instruction::I32TruncF64S => OP_I32_TRUNC_F64_S,
            Instruction::F64ConvertI32S => OP_F64_CONVERT_I32_S,
        }
    }

    /// Instructions without immediates, keyed by opcode byte
    pub fn from_plain_opcode(op: u8) -> Option<Self> {
        let inst = match op {
            OP_UNREACHABLE => Instruction::Unreachable,
            OP_NOP => Instruction::Nop,
            OP_ELSE => Instruction::Else,
            OP_END => Instruction::End,
            OP_RETURN => Instruction::Return,
            OP_DROP => Instruction::Drop,
            OP_I32_EQZ => Instruction::I32Eqz,
            OP_I32_EQ => Instruction::I32Eq,
            OP_I32_NE => Instruction::I32Ne,
            OP_I32_LT_S => Instruction::I32LtS,
            OP_I32_GT_S => Instruction::I32GtS,
            OP_I32_LE_S => Instruction::I32LeS,
            OP_I32_GE_S => Instruction::I32GeS,
            OP_F64_EQ => Instruction::F64Eq,
            OP_F64_NE => Instruction::F64Ne,
            OP_F64_LT => Instruction::F64Lt,
            OP_F64_GT => Instruction::F64Gt,
            OP_F64_LE => Instruction::F64Le,
            OP_F64_GE => Instruction::F64Ge,
            OP_I32_ADD => Instruction::I32Add,
            OP_I32_SUB => Instruction::I32Sub,
            OP_I32_MUL => Instruction::I32Mul,
            OP_I32_DIV_S => Instruction::I32DivS,
            OP_F64_NEG => Instruction::F64Neg,
            OP_F64_ADD => Instruction::F64Add,
            OP_F64_SUB => Instruction::F64Sub,
            OP_F64_MUL => Instruction::F64Mul,
            OP_F64_DIV => Instruction::F64Div,
            OP_I32_TRUNC_F64_S => Instruction::I32TruncF64S,
            OP_F64_CONVERT_I32_S => Instruction::F64ConvertI32S,
            _ => return None,
        };
        Some(inst)
    }
}

fn write_memarg(f: &mut fmt::Formatter, name: &str, m: &MemArg, natural: u32) -> fmt::Result {
    write!(f, "{}", name)?;
    if m.offset != 0 {
        write!(f, " offset={}", m.offset)?;
    }
    if m.align != natural {
        write!(f, " align={}", 1u32 << m.align.min(31))?;
    }
    Ok(())
}

fn write_block(f: &mut fmt::Formatter, name: &str, bt: &BlockType) -> fmt::Result {
    match bt {
        BlockType::Empty => write!(f, "{}", name),
        BlockType::Value(t) => write!(f, "{} (result {})", name, t),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Unreachable => write!(f, "unreachable"),
            Instruction::Nop => write!(f, "nop"),
            Instruction::Block(bt) => write_block(f, "block", bt),
            Instruction::Loop(bt) => write_block(f, "loop", bt),
            Instruction::If(bt) => write_block(f, "if", bt),
            Instruction::Else => write!(f, "else"),
            Instruction::End => write!(f, "end"),
            Instruction::Br(d) => write!(f, "br {}", d),
            Instruction::BrIf(d) => write!(f, "br_if {}", d),
            Instruction::Return => write!(f, "return"),
            Instruction::Call(i) => write!(f, "call {}", i),
            Instruction::Drop => write!(f, "drop"),
            Instruction::LocalGet(i) => write!(f, "local.get {}", i),
            Instruction::LocalSet(i) => write!(f, "local.set {}", i),
            Instruction::LocalTee(i) => write!(f, "local.tee {}", i),
            Instruction::GlobalGet(i) => write!(f, "global.get {}", i),
            Instruction::GlobalSet(i) => write!(f, "global.set {}", i),
            Instruction::I32Load(m) => write_memarg(f, "i32.load", m, 2),
            Instruction::F64Load(m) => write_memarg(f, "f64.load", m, 3),
            Instruction::I32Store(m) => write_memarg(f, "i32.store", m, 2),
            Instruction::F64Store(m) => write_memarg(f, "f64.store", m, 3),
            Instruction::I32Const(n) => write!(f, "i32.const {}", n),
            Instruction::F64Const(n) => write!(f, "f64.const {:?}", n),
            Instruction::I32Eqz => write!(f, "i32.eqz"),
            Instruction::I32Eq => write!(f, "i32.eq"),
            Instruction::I32Ne => write!(f, "i32.ne"),
            Instruction::I32LtS => write!(f, "i32.lt_s"),
            Instruction::I32GtS => write!(f, "i32.gt_s"),
            Instruction::I32LeS => write!(f, "i32.le_s"),
            Instruction::I32GeS => write!(f, "i32.ge_s"),
            Instruction::F64Eq => write!(f, "f64.eq"),
            Instruction::F64Ne => write!(f, "f64.ne"),
            Instruction::F64Lt => write!(f, "f64.lt"),
            Instruction::F64Gt => write!(f, "f64.gt"),
            Instruction::F64Le => write!(f, "f64.le"),
            Instruction::F64Ge => write!(f, "f64.ge"),
            Instruction::I32Add => write!(f, "i32.add"),
            Instruction::I32Sub => write!(f, "i32.sub"),
            Instruction::I32Mul => write!(f, "i32.mul"),
            Instruction::I32DivS => write!(f, "i32.div_s"),
            Instruction::F64Neg => write!(f, "f64.neg"),
            Instruction::F64Add => write!(f, "f64.add"),
            Instruction::F64Sub => write!(f, "f64.sub"),
            Instruction::F64Mul => write!(f, "f64.mul"),
            Instruction::F64Div => write!(f, "f64.div"),
            Instruction::I32TruncF64S => write!(f, "i32.trunc_f64_s"),
            Instruction::F64ConvertI32S => write!(f, "f64.convert_i32_s"),
        }
    }
}

/// A runtime value on the operand stack, in a local, or in a global
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    F64(f64),
}

impl Value {
    pub fn ty(&self) -> ValType {
        match self {
            Value::I32(_) => ValType::I32,
            Value::F64(_) => ValType::F64,
        }
    }

    /// Zero value a fresh local of type `ty` starts with
    pub fn zero(ty: ValType) -> Self {
        match ty {
            ValType::I32 => Value::I32(0),
            ValType::F64 => Value::F64(0.0),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::I32(n) => write!(f, "{}", n),
            Value::F64(n) => write!(f, "{}", n),
        }
    }
}
