//! Module format and WebAssembly binary serialization
//!
//! A `.wasm` file produced by `compile` is an encoded Module: type,
//! import, function, memory, global, export and code sections followed by
//! a custom `name` section carrying function and global names.
//!
//! Imported functions come first in the function index space, so a
//! defined function's index is `imports.len()` plus its position in
//! `functions`.

use std::fmt;

use super::memory::MAX_PAGES;
use super::opcodes::*;

/// A compiled module: the content of a .wasm file
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub types: Vec<FuncType>,
    pub imports: Vec<Import>,
    pub functions: Vec<Function>,
    pub memory: Option<MemoryType>,
    pub globals: Vec<Global>,
    pub exports: Vec<Export>,
}

/// Signature of a function: `(params) -> results`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let p: Vec<String> = self.params.iter().map(|t| t.to_string()).collect();
        let r: Vec<String> = self.results.iter().map(|t| t.to_string()).collect();
        write!(f, "({}) -> ({})", p.join(", "), r.join(", "))
    }
}

/// A function the host supplies at instantiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub type_index: u32,
}

/// A single function body
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub type_index: u32,
    /// Declared locals after the parameters
    pub locals: Vec<ValType>,
    /// Body without the terminating `end`
    pub code: Vec<Instruction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub min_pages: u32,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: ValType,
    pub mutable: bool,
    pub init: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func(u32),
    Memory(u32),
    Global(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decode error at offset 0x{:x}: {}", self.offset, self.message)
    }
}

impl std::error::Error for DecodeError {}

fn decode_err<T>(offset: usize, message: impl Into<String>) -> Result<T, DecodeError> {
    Err(DecodeError {
        offset,
        message: message.into(),
    })
}

// ── Binary layout ────────────────────────────────────────────────────────

const MAGIC: &[u8; 4] = b"\0asm";
const VERSION: u32 = 1;

const SECTION_CUSTOM: u8 = 0;
const SECTION_TYPE: u8 = 1;
const SECTION_IMPORT: u8 = 2;
const SECTION_FUNCTION: u8 = 3;
const SECTION_MEMORY: u8 = 5;
const SECTION_GLOBAL: u8 = 6;
const SECTION_EXPORT: u8 = 7;
const SECTION_CODE: u8 = 10;

const FUNC_TYPE_MARKER: u8 = 0x60;
const EMPTY_BLOCK_TYPE: u8 = 0x40;

const IMPORT_FUNC: u8 = 0x00;

const EXPORT_FUNC: u8 = 0x00;
const EXPORT_MEMORY: u8 = 0x02;
const EXPORT_GLOBAL: u8 = 0x03;

const NAME_SUBSECTION_FUNCTIONS: u8 = 1;
const NAME_SUBSECTION_GLOBALS: u8 = 7;

impl Module {
    pub fn new() -> Self {
        Module {
            types: Vec::new(),
            imports: Vec::new(),
            functions: Vec::new(),
            memory: None,
            globals: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Add a function type, deduplicating
    pub fn intern_type(&mut self, ty: FuncType) -> u32 {
        if let Some(pos) = self.types.iter().position(|existing| existing == &ty) {
            pos as u32
        } else {
            self.types.push(ty);
            (self.types.len() - 1) as u32
        }
    }

    /// Type of a function in the index space shared by imports and bodies
    pub fn func_type(&self, func_index: u32) -> Option<&FuncType> {
        let idx = func_index as usize;
        let type_index = match self.imports.get(idx) {
            Some(import) => import.type_index,
            None => self.functions.get(idx - self.imports.len())?.type_index,
        };
        self.types.get(type_index as usize)
    }

    pub fn function_name(&self, func_index: u32) -> Option<&str> {
        let idx = func_index as usize;
        match self.imports.get(idx) {
            Some(import) => Some(&import.name),
            None => self.functions.get(idx - self.imports.len()).map(|f| f.name.as_str()),
        }
    }

    pub fn exported_func(&self, name: &str) -> Option<u32> {
        self.exports.iter().find_map(|e| match e.kind {
            ExportKind::Func(idx) if e.name == name => Some(idx),
            _ => None,
        })
    }

    pub fn exported_global(&self, name: &str) -> Option<u32> {
        self.exports.iter().find_map(|e| match e.kind {
            ExportKind::Global(idx) if e.name == name => Some(idx),
            _ => None,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());

        if !self.types.is_empty() {
            let mut s = Vec::new();
            write_uleb128(&mut s, self.types.len() as u32);
            for ty in &self.types {
                s.push(FUNC_TYPE_MARKER);
                write_valtypes(&mut s, &ty.params);
                write_valtypes(&mut s, &ty.results);
            }
            write_section(&mut buf, SECTION_TYPE, &s);
        }

        if !self.imports.is_empty() {
            let mut s = Vec::new();
            write_uleb128(&mut s, self.imports.len() as u32);
            for import in &self.imports {
                write_name(&mut s, &import.module);
                write_name(&mut s, &import.name);
                s.push(IMPORT_FUNC);
                write_uleb128(&mut s, import.type_index);
            }
            write_section(&mut buf, SECTION_IMPORT, &s);
        }

        if !self.functions.is_empty() {
            let mut s = Vec::new();
            write_uleb128(&mut s, self.functions.len() as u32);
            for func in &self.functions {
                write_uleb128(&mut s, func.type_index);
            }
            write_section(&mut buf, SECTION_FUNCTION, &s);
        }

        if let Some(mem) = self.memory {
            let mut s = Vec::new();
            write_uleb128(&mut s, 1);
            match mem.max_pages {
                Some(max) => {
                    s.push(0x01);
                    write_uleb128(&mut s, mem.min_pages);
                    write_uleb128(&mut s, max);
                }
                None => {
                    s.push(0x00);
                    write_uleb128(&mut s, mem.min_pages);
                }
            }
            write_section(&mut buf, SECTION_MEMORY, &s);
        }

        if !self.globals.is_empty() {
            let mut s = Vec::new();
            write_uleb128(&mut s, self.globals.len() as u32);
            for g in &self.globals {
                s.push(g.ty.byte());
                s.push(if g.mutable { 1 } else { 0 });
                match g.init {
                    Value::I32(n) => serialize_instruction(&mut s, &Instruction::I32Const(n)),
                    Value::F64(n) => serialize_instruction(&mut s, &Instruction::F64Const(n)),
                }
                s.push(OP_END);
            }
            write_section(&mut buf, SECTION_GLOBAL, &s);
        }

        if !self.exports.is_empty() {
            let mut s = Vec::new();
            write_uleb128(&mut s, self.exports.len() as u32);
            for e in &self.exports {
                write_name(&mut s, &e.name);
                let (kind, idx) = match e.kind {
                    ExportKind::Func(i) => (EXPORT_FUNC, i),
                    ExportKind::Memory(i) => (EXPORT_MEMORY, i),
                    ExportKind::Global(i) => (EXPORT_GLOBAL, i),
                };
                s.push(kind);
                write_uleb128(&mut s, idx);
            }
            write_section(&mut buf, SECTION_EXPORT, &s);
        }

        if !self.functions.is_empty() {
            let mut s = Vec::new();
            write_uleb128(&mut s, self.functions.len() as u32);
            for func in &self.functions {
                let body = serialize_body(func);
                write_uleb128(&mut s, body.len() as u32);
                s.extend_from_slice(&body);
            }
            write_section(&mut buf, SECTION_CODE, &s);
        }

        let names = self.serialize_names();
        write_section(&mut buf, SECTION_CUSTOM, &names);

        buf
    }

    fn serialize_names(&self) -> Vec<u8> {
        let mut s = Vec::new();
        write_name(&mut s, "name");

        let mut funcs = Vec::new();
        let names = self
            .imports
            .iter()
            .map(|i| &i.name)
            .chain(self.functions.iter().map(|f| &f.name));
        write_uleb128(&mut funcs, (self.imports.len() + self.functions.len()) as u32);
        for (i, name) in names.enumerate() {
            write_uleb128(&mut funcs, i as u32);
            write_name(&mut funcs, name);
        }
        write_section(&mut s, NAME_SUBSECTION_FUNCTIONS, &funcs);

        if !self.globals.is_empty() {
            let mut globals = Vec::new();
            write_uleb128(&mut globals, self.globals.len() as u32);
            for (i, g) in self.globals.iter().enumerate() {
                write_uleb128(&mut globals, i as u32);
                write_name(&mut globals, &g.name);
            }
            write_section(&mut s, NAME_SUBSECTION_GLOBALS, &globals);
        }
        s
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 8 {
            return decode_err(0, "file too small");
        }
        if &data[0..4] != MAGIC {
            return decode_err(0, "invalid magic number, not a wasm module");
        }
        let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if version != VERSION {
            return decode_err(4, format!("unsupported binary version: {}", version));
        }

        let mut module = Module::new();
        let mut type_indices: Vec<u32> = Vec::new();
        let mut bodies: Vec<(Vec<ValType>, Vec<Instruction>)> = Vec::new();
        let mut func_names: Vec<(u32, String)> = Vec::new();
        let mut global_names: Vec<(u32, String)> = Vec::new();
        let mut last_id = 0u8;

        let mut pos = 8;
        while pos < data.len() {
            let id_offset = pos;
            let id = read_byte(data, &mut pos)?;
            let size = read_uleb128(data, &mut pos)? as usize;
            let end = pos + size;
            if end > data.len() {
                return decode_err(id_offset, "section extends past end of module");
            }
            if id != SECTION_CUSTOM {
                if id <= last_id {
                    return decode_err(id_offset, format!("section {} out of order", id));
                }
                last_id = id;
            }
            let section = &data[..end];
            match id {
                SECTION_CUSTOM => {
                    let name = read_name(section, &mut pos)?;
                    if name == "name" {
                        parse_names(section, &mut pos, &mut func_names, &mut global_names)?;
                    } else {
                        pos = end;
                    }
                }
                SECTION_TYPE => {
                    let count = read_uleb128(section, &mut pos)?;
                    for _ in 0..count {
                        let marker_at = pos;
                        if read_byte(section, &mut pos)? != FUNC_TYPE_MARKER {
                            return decode_err(marker_at, "expected function type marker 0x60");
                        }
                        let params = read_valtypes(section, &mut pos)?;
                        let results = read_valtypes(section, &mut pos)?;
                        module.types.push(FuncType { params, results });
                    }
                }
                SECTION_IMPORT => {
                    let count = read_uleb128(section, &mut pos)?;
                    for _ in 0..count {
                        let module_name = read_name(section, &mut pos)?;
                        let name = read_name(section, &mut pos)?;
                        let kind_at = pos;
                        let kind = read_byte(section, &mut pos)?;
                        if kind != IMPORT_FUNC {
                            return decode_err(kind_at, format!("unsupported import kind 0x{:02x}", kind));
                        }
                        let type_at = pos;
                        let type_index = read_uleb128(section, &mut pos)?;
                        if type_index as usize >= module.types.len() {
                            return decode_err(
                                type_at,
                                format!("import '{}.{}' has invalid type index {}", module_name, name, type_index),
                            );
                        }
                        module.imports.push(Import {
                            module: module_name,
                            name,
                            type_index,
                        });
                    }
                }
                SECTION_FUNCTION => {
                    let count = read_uleb128(section, &mut pos)?;
                    for _ in 0..count {
                        type_indices.push(read_uleb128(section, &mut pos)?);
                    }
                }
                SECTION_MEMORY => {
                    let count = read_uleb128(section, &mut pos)?;
                    if count > 1 {
                        return decode_err(pos, "at most one memory is supported");
                    }
                    if count == 1 {
                        let flag_at = pos;
                        let flag = read_byte(section, &mut pos)?;
                        let min_pages = read_uleb128(section, &mut pos)?;
                        let max_pages = match flag {
                            0x00 => None,
                            0x01 => Some(read_uleb128(section, &mut pos)?),
                            _ => return decode_err(flag_at, format!("invalid limits flag 0x{:02x}", flag)),
                        };
                        if min_pages > MAX_PAGES {
                            return decode_err(
                                flag_at,
                                format!("memory of {} pages exceeds the limit of {}", min_pages, MAX_PAGES),
                            );
                        }
                        if let Some(max) = max_pages {
                            if max > MAX_PAGES || max < min_pages {
                                return decode_err(flag_at, format!("invalid memory maximum of {} pages", max));
                            }
                        }
                        module.memory = Some(MemoryType { min_pages, max_pages });
                    }
                }
                SECTION_GLOBAL => {
                    let count = read_uleb128(section, &mut pos)?;
                    for i in 0..count {
                        let ty = read_valtype(section, &mut pos)?;
                        let mutable = read_byte(section, &mut pos)? != 0;
                        let init_at = pos;
                        let init = match deserialize_instruction(section, &mut pos)? {
                            Instruction::I32Const(n) => Value::I32(n),
                            Instruction::F64Const(n) => Value::F64(n),
                            other => {
                                return decode_err(init_at, format!("unsupported global initializer: {}", other))
                            }
                        };
                        if init.ty() != ty {
                            return decode_err(init_at, "global initializer type mismatch");
                        }
                        let end_at = pos;
                        if read_byte(section, &mut pos)? != OP_END {
                            return decode_err(end_at, "expected end of global initializer");
                        }
                        module.globals.push(Global {
                            name: format!("global{}", i),
                            ty,
                            mutable,
                            init,
                        });
                    }
                }
                SECTION_EXPORT => {
                    let count = read_uleb128(section, &mut pos)?;
                    for _ in 0..count {
                        let name = read_name(section, &mut pos)?;
                        let kind_at = pos;
                        let kind = read_byte(section, &mut pos)?;
                        let idx = read_uleb128(section, &mut pos)?;
                        let kind = match kind {
                            EXPORT_FUNC => ExportKind::Func(idx),
                            EXPORT_MEMORY => ExportKind::Memory(idx),
                            EXPORT_GLOBAL => ExportKind::Global(idx),
                            _ => return decode_err(kind_at, format!("unsupported export kind 0x{:02x}", kind)),
                        };
                        module.exports.push(Export { name, kind });
                    }
                }
                SECTION_CODE => {
                    let count = read_uleb128(section, &mut pos)?;
                    for _ in 0..count {
                        let body_size = read_uleb128(section, &mut pos)? as usize;
                        let body_end = pos + body_size;
                        if body_end > section.len() {
                            return decode_err(pos, "function body extends past section");
                        }
                        bodies.push(deserialize_body(&section[..body_end], &mut pos)?);
                    }
                }
                _ => return decode_err(id_offset, format!("unsupported section id {}", id)),
            }
            if pos != end {
                return decode_err(pos, format!("section {} size mismatch", id));
            }
        }

        if type_indices.len() != bodies.len() {
            return decode_err(
                pos,
                format!(
                    "function count ({}) does not match code count ({})",
                    type_indices.len(),
                    bodies.len()
                ),
            );
        }
        for (i, (type_index, (locals, code))) in type_indices.into_iter().zip(bodies).enumerate() {
            if type_index as usize >= module.types.len() {
                return decode_err(pos, format!("function {} has invalid type index {}", i, type_index));
            }
            module.functions.push(Function {
                name: format!("func{}", module.imports.len() + i),
                type_index,
                locals,
                code,
            });
        }
        // Import names come from the import section itself
        let import_count = module.imports.len();
        for (idx, name) in func_names {
            let idx = idx as usize;
            if idx < import_count {
                continue;
            }
            if let Some(func) = module.functions.get_mut(idx - import_count) {
                func.name = name;
            }
        }
        for (idx, name) in global_names {
            if let Some(g) = module.globals.get_mut(idx as usize) {
                g.name = name;
            }
        }

        Ok(module)
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

// ── LEB128 ───────────────────────────────────────────────────────────────
//
// Integers in the binary format use the variable-length LEB128 encoding:
// seven payload bits per byte, high bit set on every byte but the last.

pub fn write_uleb128(buf: &mut Vec<u8>, mut value: u32) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            return;
        }
    }
}

pub fn write_sleb128(buf: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let sign_clear = byte & 0x40 == 0;
        if (value == 0 && sign_clear) || (value == -1 && !sign_clear) {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

pub fn read_uleb128(data: &[u8], pos: &mut usize) -> Result<u32, DecodeError> {
    let start = *pos;
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = read_byte(data, pos)?;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 28 {
            return decode_err(start, "LEB128 integer too long");
        }
    }
    u32::try_from(result).or_else(|_| decode_err(start, "LEB128 integer out of range for u32"))
}

pub fn read_sleb128(data: &[u8], pos: &mut usize) -> Result<i32, DecodeError> {
    let start = *pos;
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = read_byte(data, pos)?;
        result |= ((byte & 0x7f) as i64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 64 && byte & 0x40 != 0 {
                result |= -1i64 << shift;
            }
            break;
        }
        if shift > 28 {
            return decode_err(start, "LEB128 integer too long");
        }
    }
    i32::try_from(result).or_else(|_| decode_err(start, "LEB128 integer out of range for i32"))
}

// ── Serialization helpers ────────────────────────────────────────────────

fn write_section(buf: &mut Vec<u8>, id: u8, contents: &[u8]) {
    buf.push(id);
    write_uleb128(buf, contents.len() as u32);
    buf.extend_from_slice(contents);
}

fn write_name(buf: &mut Vec<u8>, s: &str) {
    write_uleb128(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn write_valtypes(buf: &mut Vec<u8>, types: &[ValType]) {
    write_uleb128(buf, types.len() as u32);
    for t in types {
        buf.push(t.byte());
    }
}

fn write_block_type(buf: &mut Vec<u8>, bt: BlockType) {
    match bt {
        BlockType::Empty => buf.push(EMPTY_BLOCK_TYPE),
        BlockType::Value(t) => buf.push(t.byte()),
    }
}

fn write_memarg(buf: &mut Vec<u8>, m: MemArg) {
    write_uleb128(buf, m.align);
    write_uleb128(buf, m.offset);
}

fn serialize_body(func: &Function) -> Vec<u8> {
    let mut body = Vec::new();

    // Locals are run-length encoded: (count, type) groups
    let mut groups: Vec<(u32, ValType)> = Vec::new();
    for &ty in &func.locals {
        match groups.last_mut() {
            Some((count, last)) if *last == ty => *count += 1,
            _ => groups.push((1, ty)),
        }
    }
    write_uleb128(&mut body, groups.len() as u32);
    for (count, ty) in groups {
        write_uleb128(&mut body, count);
        body.push(ty.byte());
    }

    for inst in &func.code {
        serialize_instruction(&mut body, inst);
    }
    body.push(OP_END);
    body
}

pub fn serialize_instruction(buf: &mut Vec<u8>, inst: &Instruction) {
    buf.push(inst.opcode());
    match *inst {
        Instruction::Block(bt) | Instruction::Loop(bt) | Instruction::If(bt) => write_block_type(buf, bt),
        Instruction::Br(i)
        | Instruction::BrIf(i)
        | Instruction::Call(i)
        | Instruction::LocalGet(i)
        | Instruction::LocalSet(i)
        | Instruction::LocalTee(i)
        | Instruction::GlobalGet(i)
        | Instruction::GlobalSet(i) => write_uleb128(buf, i),
        Instruction::I32Load(m)
        | Instruction::F64Load(m)
        | Instruction::I32Store(m)
        | Instruction::F64Store(m) => write_memarg(buf, m),
        Instruction::I32Const(n) => write_sleb128(buf, n as i64),
        Instruction::F64Const(n) => buf.extend_from_slice(&n.to_le_bytes()),
        _ => {}
    }
}

// ── Deserialization helpers ──────────────────────────────────────────────

fn read_byte(data: &[u8], pos: &mut usize) -> Result<u8, DecodeError> {
    match data.get(*pos) {
        Some(&b) => {
            *pos += 1;
            Ok(b)
        }
        None => decode_err(*pos, "unexpected end of module"),
    }
}

fn read_f64(data: &[u8], pos: &mut usize) -> Result<f64, DecodeError> {
    if *pos + 8 > data.len() {
        return decode_err(*pos, "unexpected end of module in f64 constant");
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[*pos..*pos + 8]);
    *pos += 8;
    Ok(f64::from_le_bytes(bytes))
}

fn read_name(data: &[u8], pos: &mut usize) -> Result<String, DecodeError> {
    let len = read_uleb128(data, pos)? as usize;
    if *pos + len > data.len() {
        return decode_err(*pos, "unexpected end of module in name");
    }
    let s = String::from_utf8(data[*pos..*pos + len].to_vec())
        .or_else(|e| decode_err(*pos, format!("invalid UTF-8 in name: {}", e)))?;
    *pos += len;
    Ok(s)
}

fn read_valtype(data: &[u8], pos: &mut usize) -> Result<ValType, DecodeError> {
    let at = *pos;
    let b = read_byte(data, pos)?;
    ValType::from_byte(b).map_or_else(|| decode_err(at, format!("unsupported value type 0x{:02x}", b)), Ok)
}

fn read_valtypes(data: &[u8], pos: &mut usize) -> Result<Vec<ValType>, DecodeError> {
    let count = read_uleb128(data, pos)?;
    let mut types = Vec::new();
    for _ in 0..count {
        types.push(read_valtype(data, pos)?);
    }
    Ok(types)
}

fn read_block_type(data: &[u8], pos: &mut usize) -> Result<BlockType, DecodeError> {
    let at = *pos;
    let b = read_byte(data, pos)?;
    if b == EMPTY_BLOCK_TYPE {
        return Ok(BlockType::Empty);
    }
    match ValType::from_byte(b) {
        Some(t) => Ok(BlockType::Value(t)),
        None => decode_err(at, format!("unsupported block type 0x{:02x}", b)),
    }
}

fn read_memarg(data: &[u8], pos: &mut usize) -> Result<MemArg, DecodeError> {
    let align = read_uleb128(data, pos)?;
    let offset = read_uleb128(data, pos)?;
    Ok(MemArg { align, offset })
}

fn deserialize_body(data: &[u8], pos: &mut usize) -> Result<(Vec<ValType>, Vec<Instruction>), DecodeError> {
    let group_count = read_uleb128(data, pos)?;
    let mut locals = Vec::new();
    for _ in 0..group_count {
        let at = *pos;
        let count = read_uleb128(data, pos)?;
        let ty = read_valtype(data, pos)?;
        if locals.len() + count as usize > u16::MAX as usize {
            return decode_err(at, "too many locals");
        }
        locals.extend(std::iter::repeat(ty).take(count as usize));
    }

    let mut code = Vec::new();
    while *pos < data.len() {
        code.push(deserialize_instruction(data, pos)?);
    }
    match code.pop() {
        Some(Instruction::End) => Ok((locals, code)),
        _ => decode_err(*pos, "function body does not end with 'end'"),
    }
}

pub fn deserialize_instruction(data: &[u8], pos: &mut usize) -> Result<Instruction, DecodeError> {
    let at = *pos;
    let op = read_byte(data, pos)?;
    if let Some(inst) = Instruction::from_plain_opcode(op) {
        return Ok(inst);
    }
    let inst = match op {
        OP_BLOCK => Instruction::Block(read_block_type(data, pos)?),
        OP_LOOP => Instruction::Loop(read_block_type(data, pos)?),
        OP_IF => Instruction::If(read_block_type(data, pos)?),
        OP_BR => Instruction::Br(read_uleb128(data, pos)?),
        OP_BR_IF => Instruction::BrIf(read_uleb128(data, pos)?),
        OP_CALL => Instruction::Call(read_uleb128(data, pos)?),
        OP_LOCAL_GET => Instruction::LocalGet(read_uleb128(data, pos)?),
        OP_LOCAL_SET => Instruction::LocalSet(read_uleb128(data, pos)?),
        OP_LOCAL_TEE => Instruction::LocalTee(read_uleb128(data, pos)?),
        OP_GLOBAL_GET => Instruction::GlobalGet(read_uleb128(data, pos)?),
        OP_GLOBAL_SET => Instruction::GlobalSet(read_uleb128(data, pos)?),
        OP_I32_LOAD => Instruction::I32Load(read_memarg(data, pos)?),
        OP_F64_LOAD => Instruction::F64Load(read_memarg(data, pos)?),
        OP_I32_STORE => Instruction::I32Store(read_memarg(data, pos)?),
        OP_F64_STORE => Instruction::F64Store(read_memarg(data, pos)?),
        OP_I32_CONST => Instruction::I32Const(read_sleb128(data, pos)?),
        OP_F64_CONST => Instruction::F64Const(read_f64(data, pos)?),
        _ => return decode_err(at, format!("unknown opcode: 0x{:02x}", op)),
    };
    Ok(inst)
}

fn parse_names(
    data: &[u8],
    pos: &mut usize,
    func_names: &mut Vec<(u32, String)>,
    global_names: &mut Vec<(u32, String)>,
) -> Result<(), DecodeError> {
    while *pos < data.len() {
        let id = read_byte(data, pos)?;
        let size = read_uleb128(data, pos)? as usize;
        let end = *pos + size;
        if end > data.len() {
            return decode_err(*pos, "name subsection extends past section");
        }
        let target = match id {
            NAME_SUBSECTION_FUNCTIONS => Some(&mut *func_names),
            NAME_SUBSECTION_GLOBALS => Some(&mut *global_names),
            _ => None,
        };
        match target {
            Some(names) => {
                let sub = &data[..end];
                let count = read_uleb128(sub, pos)?;
                for _ in 0..count {
                    let idx = read_uleb128(sub, pos)?;
                    let name = read_name(sub, pos)?;
                    names.push((idx, name));
                }
            }
            None => *pos = end,
        }
    }
    Ok(())
}
