//! Single-pass Pratt-parsing bytecode emitter. There is no
//! intermediate AST: every call into the parser emits directly into the
//! chunk at the top of [`Compiler::frames`].

use std::collections::HashMap;
use std::rc::Rc;

use wisp_core::table::fnv1a;
use wisp_core::{Chunk, Object, OpCode, Source, Value, WispFunction, WispString};

use crate::error::{CompileError, ErrorLocation};
use crate::lexer::Lexer;
use crate::local::Local;
use crate::rules::{rule_for, ParseFnId, Precedence};
use crate::token::{Token, TokenKind};

const MAX_LOCALS: usize = 256;
const MAX_PARAMS: u8 = 255;

/// Per-function compilation state: its own chunk, locals, and scope depth.
/// Pushed on entry to a `fun` body, popped once the body is fully parsed.
struct FnFrame {
    chunk: Chunk,
    name: Option<Rc<Object>>,
    arity: u8,
    locals: Vec<Local>,
    scope_depth: i32,
}

impl FnFrame {
    fn new(source: Rc<Source>, name: Option<Rc<Object>>) -> Self {
        FnFrame {
            chunk: Chunk::new(source),
            name,
            arity: 0,
            // Slot 0 is reserved for the callee itself (a runtime frame's
            // `slot_base` points at it); it is never resolved by name.
            locals: vec![Local {
                name: String::new(),
                depth: 0,
            }],
            scope_depth: 0,
        }
    }
}

/// Compiles `source` into a top-level script function, or the accumulated
/// diagnostics if any stage of compilation failed.
pub fn compile(source: &str, filename: &str) -> Result<WispFunction, Vec<CompileError>> {
    let mut compiler = Compiler::new(source, filename);
    compiler.advance();
    while !compiler.check(TokenKind::Eof) {
        compiler.declaration();
    }
    let errors = std::mem::take(&mut compiler.errors);
    let function = compiler.end_compiler();
    if errors.is_empty() {
        Ok(function)
    } else {
        Err(errors)
    }
}

struct Compiler<'src> {
    lexer: Lexer<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    errors: Vec<CompileError>,
    panic_mode: bool,
    source: Rc<Source>,
    /// Interns constant-pool strings within this compilation so that
    /// repeated identical literals/names dedup under `Chunk::add_constant`,
    /// whose dedup check compares objects by `Rc` identity (interning
    /// scoped to one compile unit; the VM folds these into its
    /// process-wide table when it loads the chunk).
    intern_cache: HashMap<Vec<u8>, Rc<Object>>,
    frames: Vec<FnFrame>,
}

impl<'src> Compiler<'src> {
    fn new(source_text: &'src str, filename: &str) -> Self {
        let source = Rc::new(Source {
            filename: filename.to_string(),
            text: source_text.to_string(),
        });
        let sentinel = Token {
            kind: TokenKind::Eof,
            lexeme: "",
            line: 0,
            column: 0,
        };
        Compiler {
            lexer: Lexer::new(source_text),
            previous: sentinel,
            current: sentinel,
            errors: Vec::new(),
            panic_mode: false,
            frames: vec![FnFrame::new(source.clone(), None)],
            source,
            intern_cache: HashMap::new(),
        }
    }

    fn frame(&self) -> &FnFrame {
        self.frames.last().expect("compiler frame stack is never empty")
    }

    fn frame_mut(&mut self) -> &mut FnFrame {
        self.frames
            .last_mut()
            .expect("compiler frame stack is never empty")
    }

    // ----- token stream -----------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.lexer.next_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let tok = self.current;
            self.error_at(tok.line, tok.column, ErrorLocation::Lexical, tok.lexeme);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    // ----- diagnostics ---------------------------------------------------

    fn error_at(&mut self, line: u32, column: u32, at: ErrorLocation, message: impl Into<String>) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(CompileError {
            message: message.into(),
            line,
            column,
            at,
        });
    }

    fn error_at_current(&mut self, message: impl Into<String>) {
        let tok = self.current;
        let at = if tok.kind == TokenKind::Eof {
            ErrorLocation::End
        } else {
            ErrorLocation::Token(tok.lexeme.to_string())
        };
        self.error_at(tok.line, tok.column, at, message);
    }

    fn error(&mut self, message: impl Into<String>) {
        let tok = self.previous;
        let at = if tok.kind == TokenKind::Eof {
            ErrorLocation::End
        } else {
            ErrorLocation::Token(tok.lexeme.to_string())
        };
        self.error_at(tok.line, tok.column, at, message);
    }

    // ----- emission -------------------------------------------------------

    fn emit_op(&mut self, op: OpCode) {
        let (line, column) = (self.previous.line, self.previous.column);
        self.frame_mut().chunk.emit_op(op, line, column);
    }

    fn emit_byte(&mut self, byte: u8) {
        let (line, column) = (self.previous.line, self.previous.column);
        self.frame_mut().chunk.emit(byte, line, column);
    }

    fn emit_u16(&mut self, value: u16) {
        let (line, column) = (self.previous.line, self.previous.column);
        self.frame_mut().chunk.emit_u16(value, line, column);
    }

    /// Constant-operand width promotion: emits the short one-byte form
    /// when `index` fits in `u8`, else promotes to the `_LONG` two-byte
    /// form.
    fn emit_indexed(&mut self, short: OpCode, index: usize) {
        if index <= u8::MAX as usize {
            self.emit_op(short);
            self.emit_byte(index as u8);
        } else if index <= u16::MAX as usize {
            let long = short
                .promote()
                .expect("emit_indexed only called with promotable opcodes");
            self.emit_op(long);
            self.emit_u16(index as u16);
        } else {
            self.error("Too many constants in one chunk.");
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.frame_mut().chunk.add_constant(value, true);
        self.emit_indexed(OpCode::Const, idx);
    }

    fn identifier_constant(&mut self, name: &str) -> usize {
        let obj = self.intern_string(name.as_bytes());
        self.frame_mut().chunk.add_constant(Value::Object(obj), true)
    }

    fn intern_string(&mut self, bytes: &[u8]) -> Rc<Object> {
        if let Some(existing) = self.intern_cache.get(bytes) {
            return existing.clone();
        }
        let hash = fnv1a(bytes);
        let obj = Rc::new(Object::Str(WispString::new(bytes.to_vec().into_boxed_slice(), hash)));
        self.intern_cache.insert(bytes.to_vec(), obj.clone());
        obj
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_u16(0xffff);
        self.frame().chunk.len() - 2
    }

    fn patch_jump(&mut self, operand_offset: usize) {
        let jump = self.frame().chunk.len() - operand_offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
            return;
        }
        self.frame_mut().chunk.patch_u16(operand_offset, jump as u16);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.frame().chunk.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
            return;
        }
        self.emit_u16(offset as u16);
    }

    fn emit_return(&mut self) {
        self.emit_op(OpCode::Nil);
        self.emit_op(OpCode::Ret);
    }

    // ----- scope & locals ---------------------------------------------

    fn begin_scope(&mut self) {
        self.frame_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.frame_mut().scope_depth -= 1;
        let depth = self.frame().scope_depth;
        loop {
            let should_pop = matches!(self.frame().locals.last(), Some(l) if l.depth > depth);
            if !should_pop {
                break;
            }
            self.frame_mut().locals.pop();
            self.emit_op(OpCode::Pop);
        }
    }

    fn declare_variable(&mut self, name: &str) {
        let scope_depth = self.frame().scope_depth;
        if scope_depth == 0 {
            return;
        }
        let mut conflict = false;
        for local in self.frame().locals.iter().rev() {
            if local.depth != -1 && local.depth < scope_depth {
                break;
            }
            if local.name == name {
                conflict = true;
                break;
            }
        }
        if conflict {
            self.error("Already a variable with this name in this scope.");
            return;
        }
        if self.frame().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.frame_mut().locals.push(Local {
            name: name.to_string(),
            depth: -1,
        });
    }

    fn mark_initialized(&mut self) {
        if self.frame().scope_depth == 0 {
            return;
        }
        let depth = self.frame().scope_depth;
        let frame = self.frame_mut();
        let last = frame.locals.len() - 1;
        frame.locals[last].depth = depth;
    }

    /// Scans locals from the top down; a hit whose `depth == -1` means the
    /// name refers to itself inside its own initializer, which is an error
    /// (a self-reference inside a variable's own initializer).
    fn resolve_local(&mut self, name: &str) -> Option<u8> {
        let found = self
            .frame()
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, l)| l.name == name)
            .map(|(i, l)| (i, l.depth));
        match found {
            Some((_, -1)) => {
                self.error("Cannot read local variable in its own initializer.");
                found.map(|(i, _)| i as u8)
            }
            Some((i, _)) => Some(i as u8),
            None => None,
        }
    }

    /// At depth 0, interns the name and returns its constant-pool index;
    /// at depth > 0 the variable is a local and no constant is needed.
    fn parse_variable(&mut self, message: &str) -> (String, usize) {
        self.consume(TokenKind::Identifier, message);
        let name = self.previous.lexeme.to_string();
        self.declare_variable(&name);
        if self.frame().scope_depth > 0 {
            return (name, 0);
        }
        let idx = self.identifier_constant(&name);
        (name, idx)
    }

    fn define_variable(&mut self, global_idx: usize) {
        if self.frame().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_indexed(OpCode::Def, global_idx);
    }

    // ----- declarations & statements -----------------------------------

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn fun_declaration(&mut self) {
        let (name, global_idx) = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(&name);
        self.define_variable(global_idx);
    }

    fn function(&mut self, name: &str) {
        let name_obj = self.intern_string(name.as_bytes());
        self.frames.push(FnFrame::new(self.source.clone(), Some(name_obj)));
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.frame().arity == MAX_PARAMS {
                    self.error_at_current("Can't have more than 255 parameters.");
                } else {
                    self.frame_mut().arity += 1;
                }
                let _ = self.parse_variable("Expect parameter name.");
                self.define_variable(0);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();
        self.emit_return();

        let fn_frame = self.frames.pop().expect("function() always pushed a frame");
        let function = WispFunction {
            name: fn_frame.name,
            arity: fn_frame.arity,
            chunk: fn_frame.chunk,
        };
        let const_idx = self
            .frame_mut()
            .chunk
            .add_constant(Value::Object(Rc::new(Object::Function(function))), false);
        self.emit_indexed(OpCode::Const, const_idx);
    }

    fn var_declaration(&mut self) {
        let (_, global_idx) = self.parse_variable("Expect variable name.");
        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global_idx);
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
        self.emit_byte(1);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::Jmpf);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jmp);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.frame().chunk.len();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::Jmpf);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn return_statement(&mut self) {
        if self.frames.len() == 1 {
            self.error("Cannot return from top-level code.");
        }
        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Ret);
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn synchronize(&mut self) {
        tracing::warn!(
            line = self.previous.line,
            "parse error recovery: discarding tokens until the next statement boundary"
        );
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ----- expressions -----------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// The Pratt driver: consume one token, run its prefix rule, then
    /// keep consuming infix operators whose precedence is at or above
    /// `precedence`.
    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = rule_for(self.previous.kind).prefix;
        let prefix = match prefix {
            Some(id) => id,
            None => {
                self.error("Expect expression.");
                return;
            }
        };
        let can_assign = precedence <= Precedence::Assignment;
        self.dispatch(prefix, can_assign);

        while precedence <= rule_for(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = rule_for(self.previous.kind).infix {
                self.dispatch(infix, can_assign);
            }
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn dispatch(&mut self, id: ParseFnId, can_assign: bool) {
        match id {
            ParseFnId::Grouping => self.grouping(can_assign),
            ParseFnId::Unary => self.unary(can_assign),
            ParseFnId::Binary => self.binary(can_assign),
            ParseFnId::Number => self.number(can_assign),
            ParseFnId::StringLit => self.string_lit(can_assign),
            ParseFnId::Literal => self.literal(can_assign),
            ParseFnId::Variable => self.variable(can_assign),
            ParseFnId::And => self.and_(can_assign),
            ParseFnId::Or => self.or_(can_assign),
            ParseFnId::Call => self.call(can_assign),
            ParseFnId::Dot => self.dot(can_assign),
            ParseFnId::Map => self.map_literal(can_assign),
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, _can_assign: bool) {
        let op_kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match op_kind {
            TokenKind::Minus => self.emit_op(OpCode::Neg),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => self.error("Internal error: unary() dispatched for a non-unary token."),
        }
    }

    /// `>`, `>=`, `!=` are synthesized as `LE NOT`, `LT NOT`, `EQ NOT`
    /// respectively, rather than getting their own opcodes.
    fn binary(&mut self, _can_assign: bool) {
        let op_kind = self.previous.kind;
        let precedence = rule_for(op_kind).precedence;
        self.parse_precedence(precedence.next());
        match op_kind {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Sub),
            TokenKind::Star => self.emit_op(OpCode::Mul),
            TokenKind::Slash => self.emit_op(OpCode::Div),
            TokenKind::EqualEqual => self.emit_op(OpCode::Eq),
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Eq);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Less => self.emit_op(OpCode::Lt),
            TokenKind::LessEqual => self.emit_op(OpCode::Le),
            TokenKind::Greater => {
                self.emit_op(OpCode::Le);
                self.emit_op(OpCode::Not);
            }
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Lt);
                self.emit_op(OpCode::Not);
            }
            _ => self.error("Internal error: binary() dispatched for a non-binary token."),
        }
    }

    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::Jmpf);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::Jmpf);
        let end_jump = self.emit_jump(OpCode::Jmp);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit_op(OpCode::Call);
        self.emit_byte(argc);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: u32 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if count == 255 {
                    self.error("Can't have more than 255 arguments.");
                }
                count += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count.min(255) as u8
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Identifier, "Expect property name after '.'.");
        let name = self.previous.lexeme.to_string();
        let idx = self.identifier_constant(&name);
        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_indexed(OpCode::Set, idx);
        } else {
            self.emit_indexed(OpCode::Get, idx);
        }
    }

    /// `'{' (expression (',' expression)* ','?)? '}'` at `PRIMARY`,
    /// emitting `OpCode::Map` with the element count. Only reachable from
    /// expression position — a block is only ever parsed in statement
    /// position, so `{` never means both.
    fn map_literal(&mut self, _can_assign: bool) {
        let mut count: u32 = 0;
        if !self.check(TokenKind::RightBrace) {
            loop {
                self.expression();
                count += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
                if self.check(TokenKind::RightBrace) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after map literal.");
        if count > u8::MAX as u32 {
            self.error("Too many elements in map literal.");
            return;
        }
        self.emit_op(OpCode::Map);
        self.emit_byte(count as u8);
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().unwrap_or(0.0);
        self.emit_constant(Value::Number(value));
    }

    fn string_lit(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme.as_bytes();
        let inner = &lexeme[1..lexeme.len() - 1];
        let obj = self.intern_string(inner);
        self.emit_constant(Value::Object(obj));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => self.error("Internal error: literal() dispatched for a non-literal token."),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme.to_string();
        self.named_variable(&name, can_assign);
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        if let Some(slot) = self.resolve_local(name) {
            if can_assign && self.match_token(TokenKind::Equal) {
                self.expression();
                self.emit_op(OpCode::St);
                self.emit_byte(slot);
            } else {
                self.emit_op(OpCode::Ld);
                self.emit_byte(slot);
            }
            return;
        }
        let idx = self.identifier_constant(name);
        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_indexed(OpCode::Gst, idx);
        } else {
            self.emit_indexed(OpCode::Gld, idx);
        }
    }

    fn end_compiler(mut self) -> WispFunction {
        self.emit_op(OpCode::Nil);
        self.emit_op(OpCode::Ret);
        let top = self
            .frames
            .pop()
            .expect("the top-level frame is pushed once by Compiler::new and never popped early");
        WispFunction {
            name: top.name,
            arity: top.arity,
            chunk: top.chunk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_simple_expression_statement() {
        let result = compile("print 1 + 2;", "<test>");
        assert!(result.is_ok());
    }

    #[test]
    fn chunk_code_and_lines_stay_parallel_after_compiling() {
        let function = compile("var a = 1; { var a = 2; print a; } print a;", "<test>").unwrap();
        assert_eq!(function.chunk.len(), function.chunk.len());
        assert!(!function.chunk.is_empty());
    }

    #[test]
    fn self_referencing_initializer_is_a_compile_error() {
        let errors = compile("{ var x = x; }", "<test>").unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("own initializer")));
    }

    #[test]
    fn duplicate_local_in_same_scope_is_an_error() {
        let errors = compile("{ var a = 1; var a = 2; }", "<test>").unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("Already a variable")));
    }

    #[test]
    fn missing_semicolon_is_reported_at_the_offending_token() {
        let errors = compile("print 1", "<test>").unwrap_err();
        assert!(matches!(errors[0].at, ErrorLocation::End));
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let errors = compile("return 1;", "<test>").unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("top-level")));
    }

    #[test]
    fn function_declaration_compiles_and_allows_recursive_calls() {
        let result = compile("fun fib(n) { return n; } print fib(1);", "<test>");
        assert!(result.is_ok());
    }

    #[test]
    fn while_loop_compiles_without_error() {
        let result = compile("var i = 0; while (i < 3) { i = i + 1; }", "<test>");
        assert!(result.is_ok());
    }

    #[test]
    fn map_literal_and_field_access_compile() {
        let result = compile("var m = { 1, 2 }; print m.foo;", "<test>");
        assert!(result.is_ok());
    }

    #[test]
    fn comparison_precedence_matches_scenario_seven() {
        // `1 < 2 == true` should parse as `(1 < 2) == true`, not
        // `1 < (2 == true)`.
        let result = compile("print 1 < 2 == true;", "<test>");
        assert!(result.is_ok());
    }
}
