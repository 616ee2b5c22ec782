//! Recursive-descent parser for type-declaration sources.
//!
//! Accepts the declaration subset of the language: functions, classes, interfaces,
//! type aliases, enums, variables, namespaces and ambient modules, plus the export
//! forms that select a module's public surface. Statement bodies and initializers are
//! skipped. Anything else is a fatal parse error with a `line:col` location.

use anyhow::{anyhow, Result};

use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};

/// Parse a declaration source into statements.
pub fn parse(src: &str) -> Result<Vec<Statement>> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
    };
    parser.parse_statements(false)
}

/// Words that may start a statement; used to recover from a missing `;`.
const STATEMENT_STARTS: [&str; 16] = [
    "export", "import", "declare", "function", "class", "interface", "type", "enum", "const",
    "let", "var", "namespace", "module", "abstract", "async", "global",
];

/// Words that act as member modifiers when followed by a member name.
const MEMBER_MODIFIERS: [&str; 12] = [
    "public", "private", "protected", "static", "readonly", "abstract", "declare", "override",
    "accessor", "async", "get", "set",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

#[derive(Clone, Copy, PartialEq)]
enum Accessor {
    None,
    Get,
    Set,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn error(&self, msg: impl std::fmt::Display) -> anyhow::Error {
        let tok = self.peek();
        anyhow!("{}:{}: {} (found {:?})", tok.line, tok.col, msg, tok.kind)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.peek().is_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if self.peek().is_ident(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", p)))
        }
    }

    fn expect_name(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn eat_semi(&mut self) {
        while self.eat_punct(";") {}
    }

    fn peek_ident(&self) -> Option<&str> {
        match &self.peek().kind {
            TokenKind::Ident(word) => Some(word),
            _ => None,
        }
    }

    // ---------------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------------

    fn parse_statements(&mut self, until_brace: bool) -> Result<Vec<Statement>> {
        let mut out = Vec::new();
        loop {
            if self.at_eof() {
                if until_brace {
                    return Err(self.error("expected `}`"));
                }
                break;
            }
            if until_brace && self.eat_punct("}") {
                break;
            }
            if self.eat_punct(";") {
                continue;
            }
            self.parse_statement(&mut out)?;
        }
        Ok(out)
    }

    fn parse_statement(&mut self, out: &mut Vec<Statement>) -> Result<()> {
        if self.peek().is_ident("import") {
            self.skip_statement();
            out.push(Statement::Other);
            return Ok(());
        }

        if self.eat_ident("export") {
            return self.parse_export(out);
        }

        for decl in self.parse_declaration()? {
            out.push(Statement::Decl {
                decl,
                exported: false,
            });
        }
        Ok(())
    }

    fn parse_export(&mut self, out: &mut Vec<Statement>) -> Result<()> {
        if self.eat_punct("=") {
            let name = self.parse_qualified_name()?;
            self.eat_semi();
            out.push(Statement::ExportAssignment(name));
            return Ok(());
        }

        if self.peek().is_ident("as") || self.peek().is_ident("import") || self.peek().is_punct("*")
        {
            self.skip_statement();
            out.push(Statement::Other);
            return Ok(());
        }

        if self.peek().is_ident("type") && self.peek_at(1).is_punct("{") {
            self.bump();
        }
        if self.eat_punct("{") {
            let mut specifiers = Vec::new();
            while !self.eat_punct("}") {
                self.eat_ident("type");
                let local = self.parse_property_name()?;
                let exported = if self.eat_ident("as") {
                    self.parse_property_name()?
                } else {
                    local.clone()
                };
                specifiers.push(ExportSpecifier { local, exported });
                if !self.eat_punct(",") && !self.peek().is_punct("}") {
                    return Err(self.error("expected `,` or `}` in export list"));
                }
            }
            let from = if self.eat_ident("from") {
                match self.bump().kind {
                    TokenKind::Str(s) => Some(s),
                    _ => return Err(self.error("expected module specifier")),
                }
            } else {
                None
            };
            self.eat_semi();
            out.push(Statement::ExportList { specifiers, from });
            return Ok(());
        }

        if self.eat_ident("default") {
            let starts_decl = matches!(
                self.peek_ident(),
                Some("function" | "class" | "abstract" | "interface" | "declare" | "enum")
            );
            if !starts_decl {
                let local = self.parse_qualified_name()?;
                self.skip_statement();
                out.push(Statement::ExportList {
                    specifiers: vec![ExportSpecifier {
                        local: local.join("."),
                        exported: "default".to_string(),
                    }],
                    from: None,
                });
                return Ok(());
            }
        }

        for decl in self.parse_declaration()? {
            out.push(Statement::Decl {
                decl,
                exported: true,
            });
        }
        Ok(())
    }

    fn parse_declaration(&mut self) -> Result<Vec<Decl>> {
        self.eat_ident("declare");
        if self.peek().is_ident("abstract") && self.peek_at(1).is_ident("class") {
            self.bump();
        }
        if self.peek().is_ident("async") && self.peek_at(1).is_ident("function") {
            self.bump();
        }

        let keyword = match self.peek_ident() {
            Some(word) => word.to_string(),
            None => return Err(self.error("expected declaration")),
        };
        let decl = match keyword.as_str() {
            "function" => {
                self.bump();
                self.eat_punct("*");
                let name = if self.peek().is_punct("(") || self.peek().is_punct("<") {
                    "default".to_string()
                } else {
                    self.expect_name()?
                };
                let sig = self.parse_fn_sig()?;
                self.eat_semi();
                Decl::Function { name, sig }
            }
            "class" => Decl::Class(self.parse_class()?),
            "interface" => Decl::Interface(self.parse_interface()?),
            "type" => {
                self.bump();
                let name = self.expect_name()?;
                let type_params = self.parse_type_params()?;
                self.expect_punct("=")?;
                let ty = self.parse_type()?;
                self.eat_semi();
                Decl::TypeAlias(TypeAliasDecl {
                    name,
                    type_params,
                    ty,
                })
            }
            "enum" => Decl::Enum(self.parse_enum()?),
            "const" if self.peek_at(1).is_ident("enum") => {
                self.bump();
                Decl::Enum(self.parse_enum()?)
            }
            "const" | "let" | "var" => {
                self.bump();
                return self.parse_variables();
            }
            "namespace" | "module" => {
                self.bump();
                if let TokenKind::Str(specifier) = self.peek().kind.clone() {
                    self.bump();
                    if !self.eat_punct("{") {
                        self.eat_semi();
                        return Ok(Vec::new());
                    }
                    let body = self.parse_statements(true)?;
                    Decl::AmbientModule { specifier, body }
                } else {
                    let path = self.parse_qualified_name()?;
                    self.expect_punct("{")?;
                    let body = self.parse_statements(true)?;
                    nest_namespace(path, body)
                }
            }
            "global" => {
                self.bump();
                self.skip_balanced("{", "}")?;
                return Ok(Vec::new());
            }
            _ => return Err(self.error("expected declaration")),
        };
        Ok(vec![decl])
    }

    fn parse_variables(&mut self) -> Result<Vec<Decl>> {
        let mut decls = Vec::new();
        loop {
            let name = if self.peek().is_punct("{") {
                self.skip_balanced("{", "}")?;
                None
            } else if self.peek().is_punct("[") {
                self.skip_balanced("[", "]")?;
                None
            } else {
                Some(self.expect_name()?)
            };
            self.eat_punct("!");
            let ty = if self.eat_punct(":") {
                Some(self.parse_type()?)
            } else {
                None
            };
            if self.eat_punct("=") {
                self.skip_initializer();
            }
            if let Some(name) = name {
                decls.push(Decl::Variable { name, ty });
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.eat_semi();
        Ok(decls)
    }

    fn parse_class(&mut self) -> Result<ClassDecl> {
        self.bump();
        let name = match self.peek_ident() {
            Some(word) if word != "extends" && word != "implements" => self.expect_name()?,
            _ => "default".to_string(),
        };
        let type_params = self.parse_type_params()?;
        let extends = if self.eat_ident("extends") {
            Some(self.parse_operator_type()?)
        } else {
            None
        };
        let mut implements = Vec::new();
        if self.eat_ident("implements") {
            loop {
                implements.push(self.parse_operator_type()?);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct("{")?;
        let members = self.parse_members(true)?;
        Ok(ClassDecl {
            name,
            type_params,
            extends,
            implements,
            members,
        })
    }

    fn parse_interface(&mut self) -> Result<InterfaceDecl> {
        self.bump();
        let name = self.expect_name()?;
        let type_params = self.parse_type_params()?;
        let mut extends = Vec::new();
        if self.eat_ident("extends") {
            loop {
                extends.push(self.parse_operator_type()?);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct("{")?;
        let members = self.parse_members(false)?;
        Ok(InterfaceDecl {
            name,
            type_params,
            extends,
            members,
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDecl> {
        self.bump();
        let name = self.expect_name()?;
        self.expect_punct("{")?;
        let mut members = Vec::new();
        while !self.eat_punct("}") {
            let member = self.parse_property_name()?;
            let value = if self.eat_punct("=") {
                let value = match self.peek().kind {
                    TokenKind::Str(_) | TokenKind::Template => EnumValue::String,
                    _ => EnumValue::Number,
                };
                self.skip_initializer();
                value
            } else {
                EnumValue::Number
            };
            members.push((member, value));
            if !self.eat_punct(",") && !self.peek().is_punct("}") {
                return Err(self.error("expected `,` or `}` in enum"));
            }
        }
        Ok(EnumDecl { name, members })
    }

    // ---------------------------------------------------------------------------
    // Members
    // ---------------------------------------------------------------------------

    /// Members up to and including the closing `}`.
    fn parse_members(&mut self, in_class: bool) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        loop {
            if self.eat_punct("}") {
                break;
            }
            if self.at_eof() {
                return Err(self.error("expected `}`"));
            }
            if self.eat_punct(";") || self.eat_punct(",") {
                continue;
            }
            if let Some(member) = self.parse_member(in_class)? {
                members.push(member);
            }
        }
        Ok(members)
    }

    fn is_modifier_position(&self) -> bool {
        let next = self.peek_at(1);
        matches!(
            next.kind,
            TokenKind::Ident(_) | TokenKind::Str(_) | TokenKind::Number(_)
        ) || next.is_punct("[")
            || next.is_punct("*")
    }

    fn parse_member(&mut self, in_class: bool) -> Result<Option<Member>> {
        let mut modifiers = Modifiers::default();
        let mut accessor = Accessor::None;
        while let Some(word) = self.peek_ident() {
            if !MEMBER_MODIFIERS.contains(&word) || !self.is_modifier_position() {
                break;
            }
            match word {
                "static" => modifiers.is_static = true,
                "private" | "protected" => modifiers.hidden = true,
                "get" => accessor = Accessor::Get,
                "set" => accessor = Accessor::Set,
                _ => {}
            }
            self.bump();
        }
        self.eat_punct("*");

        if self.peek().is_punct("[") {
            let is_index = matches!(self.peek_at(1).kind, TokenKind::Ident(_))
                && self.peek_at(2).is_punct(":");
            if is_index {
                self.bump();
                self.bump();
                self.bump();
                self.parse_type()?;
                self.expect_punct("]")?;
                self.eat_punct("?");
                let value = if self.eat_punct(":") {
                    self.parse_type()?
                } else {
                    TypeExpr::Keyword(Keyword::Any)
                };
                return Ok(Some(Member::Index { value, modifiers }));
            }
            // Computed key such as `[Symbol.iterator]`: parse and drop.
            self.skip_balanced("[", "]")?;
            self.eat_punct("?");
            if self.peek().is_punct("(") || self.peek().is_punct("<") {
                self.parse_fn_sig()?;
            } else if self.eat_punct(":") {
                self.parse_type()?;
            }
            return Ok(None);
        }

        if self.peek().is_punct("(") || self.peek().is_punct("<") {
            return Ok(Some(Member::Call(self.parse_fn_sig()?)));
        }
        if self.peek().is_ident("new")
            && (self.peek_at(1).is_punct("(") || self.peek_at(1).is_punct("<"))
        {
            self.bump();
            return Ok(Some(Member::Constructor(self.parse_fn_sig()?)));
        }
        if in_class && self.peek().is_ident("constructor") && self.peek_at(1).is_punct("(") {
            self.bump();
            let sig = self.parse_fn_sig()?;
            if self.peek().is_punct("{") {
                self.skip_balanced("{", "}")?;
            }
            return Ok(Some(Member::Constructor(sig)));
        }

        let name = self.parse_property_name()?;
        if name.starts_with('#') {
            modifiers.hidden = true;
        }
        let optional = self.eat_punct("?");
        self.eat_punct("!");

        if self.peek().is_punct("(") || self.peek().is_punct("<") {
            let sig = self.parse_fn_sig()?;
            if self.peek().is_punct("{") {
                self.skip_balanced("{", "}")?;
            }
            return Ok(match accessor {
                Accessor::Get => Some(Member::Property {
                    name,
                    optional,
                    ty: sig.ret,
                    modifiers,
                }),
                Accessor::Set => None,
                Accessor::None => Some(Member::Method {
                    name,
                    optional,
                    sig,
                    modifiers,
                }),
            });
        }

        let ty = if self.eat_punct(":") {
            Some(self.parse_type()?)
        } else {
            None
        };
        if self.eat_punct("=") {
            self.skip_initializer();
        }
        Ok(Some(Member::Property {
            name,
            optional,
            ty,
            modifiers,
        }))
    }

    fn parse_property_name(&mut self) -> Result<String> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) | TokenKind::Str(name) => {
                self.bump();
                Ok(name)
            }
            TokenKind::Number(n) => {
                self.bump();
                Ok(n.to_string())
            }
            _ => Err(self.error("expected property name")),
        }
    }

    // ---------------------------------------------------------------------------
    // Signatures
    // ---------------------------------------------------------------------------

    fn parse_type_params(&mut self) -> Result<Vec<TypeParam>> {
        let mut params = Vec::new();
        if !self.eat_punct("<") {
            return Ok(params);
        }
        while !self.eat_punct(">") {
            while matches!(self.peek_ident(), Some("const" | "in" | "out"))
                && matches!(self.peek_at(1).kind, TokenKind::Ident(_))
            {
                self.bump();
            }
            let name = self.expect_name()?;
            let constraint = if self.eat_ident("extends") {
                Some(self.parse_type()?)
            } else {
                None
            };
            if self.eat_punct("=") {
                self.parse_type()?;
            }
            params.push(TypeParam { name, constraint });
            if !self.eat_punct(",") && !self.peek().is_punct(">") {
                return Err(self.error("expected `,` or `>` in type parameters"));
            }
        }
        Ok(params)
    }

    /// `<T>(a: A, b?: B): R` with the return annotation optional.
    fn parse_fn_sig(&mut self) -> Result<FnSig> {
        let type_params = self.parse_type_params()?;
        let params = self.parse_params()?;
        let ret = if self.eat_punct(":") {
            Some(self.parse_return_type()?)
        } else {
            None
        };
        Ok(FnSig {
            type_params,
            params,
            ret,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            while matches!(
                self.peek_ident(),
                Some("public" | "private" | "protected" | "readonly" | "override")
            ) && matches!(self.peek_at(1).kind, TokenKind::Ident(_))
            {
                self.bump();
            }
            let rest = self.eat_punct("...");
            let name = if self.peek().is_punct("{") {
                self.skip_balanced("{", "}")?;
                "options".to_string()
            } else if self.peek().is_punct("[") {
                self.skip_balanced("[", "]")?;
                "items".to_string()
            } else {
                self.expect_name()?
            };
            let optional = self.eat_punct("?");
            let ty = if self.eat_punct(":") {
                Some(self.parse_type()?)
            } else {
                None
            };
            if self.eat_punct("=") {
                self.skip_initializer();
            }
            if name != "this" {
                params.push(Param {
                    name,
                    ty,
                    optional,
                    rest,
                });
            }
            if !self.eat_punct(",") && !self.peek().is_punct(")") {
                return Err(self.error("expected `,` or `)` in parameter list"));
            }
        }
        Ok(params)
    }

    fn parse_return_type(&mut self) -> Result<TypeExpr> {
        if self.peek().is_ident("asserts") && matches!(self.peek_at(1).kind, TokenKind::Ident(_))
        {
            self.bump();
            self.bump();
            if self.eat_ident("is") {
                self.parse_type()?;
            }
            return Ok(TypeExpr::Keyword(Keyword::Void));
        }
        if matches!(self.peek().kind, TokenKind::Ident(_))
            && self.peek_at(1).is_ident("is")
            && !self.peek_at(1).newline_before
        {
            self.bump();
            self.bump();
            self.parse_type()?;
            return Ok(TypeExpr::Predicate);
        }
        self.parse_type()
    }

    // ---------------------------------------------------------------------------
    // Types
    // ---------------------------------------------------------------------------

    fn parse_type(&mut self) -> Result<TypeExpr> {
        if self.peek().is_ident("abstract") && self.peek_at(1).is_ident("new") {
            self.bump();
        }
        if self.peek().is_ident("new")
            && (self.peek_at(1).is_punct("(") || self.peek_at(1).is_punct("<"))
        {
            self.bump();
            return self.parse_fn_type();
        }
        if self.peek().is_punct("<") || (self.peek().is_punct("(") && self.arrow_ahead()) {
            return self.parse_fn_type();
        }

        let ty = self.parse_union()?;
        if self.peek().is_ident("extends") && !self.peek().newline_before {
            self.bump();
            self.parse_union()?;
            self.expect_punct("?")?;
            self.parse_type()?;
            self.expect_punct(":")?;
            self.parse_type()?;
            return Ok(TypeExpr::Opaque);
        }
        Ok(ty)
    }

    fn parse_fn_type(&mut self) -> Result<TypeExpr> {
        let type_params = self.parse_type_params()?;
        let params = self.parse_params()?;
        self.expect_punct("=>")?;
        let ret = Some(self.parse_return_type()?);
        Ok(TypeExpr::Function(Box::new(FnSig {
            type_params,
            params,
            ret,
        })))
    }

    /// At `(`: whether the matching `)` is followed by `=>`.
    fn arrow_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.pos;
        while i < self.tokens.len() {
            let tok = &self.tokens[i];
            if tok.is_punct("(") || tok.is_punct("[") || tok.is_punct("{") {
                depth += 1;
            } else if tok.is_punct(")") || tok.is_punct("]") || tok.is_punct("}") {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return self
                        .tokens
                        .get(i + 1)
                        .is_some_and(|next| next.is_punct("=>"));
                }
            } else if tok.kind == TokenKind::Eof {
                return false;
            }
            i += 1;
        }
        false
    }

    fn parse_union(&mut self) -> Result<TypeExpr> {
        self.eat_punct("|");
        let mut members = vec![self.parse_intersection()?];
        while self.eat_punct("|") {
            members.push(self.parse_intersection()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeExpr::Union(members)
        })
    }

    fn parse_intersection(&mut self) -> Result<TypeExpr> {
        self.eat_punct("&");
        let mut members = vec![self.parse_operator_type()?];
        while self.eat_punct("&") {
            members.push(self.parse_operator_type()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeExpr::Intersection(members)
        })
    }

    fn parse_operator_type(&mut self) -> Result<TypeExpr> {
        let next_is_type = !self.peek_at(1).is_punct(",")
            && !self.peek_at(1).is_punct(")")
            && !self.peek_at(1).is_punct(">")
            && !self.peek_at(1).is_punct("]")
            && !self.peek_at(1).is_punct(";")
            && !self.peek_at(1).is_punct("|")
            && !self.peek_at(1).is_punct("&");
        match self.peek_ident() {
            Some("keyof") if next_is_type => {
                self.bump();
                Ok(TypeExpr::Keyof(Box::new(self.parse_operator_type()?)))
            }
            Some("unique" | "readonly") if next_is_type => {
                self.bump();
                self.parse_operator_type()
            }
            Some("infer") if next_is_type => {
                self.bump();
                self.expect_name()?;
                if self.peek().is_ident("extends") {
                    self.bump();
                    self.parse_operator_type()?;
                }
                Ok(TypeExpr::Opaque)
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<TypeExpr> {
        let mut ty = self.parse_primary()?;
        while self.peek().is_punct("[") && !self.peek().newline_before {
            self.bump();
            if self.eat_punct("]") {
                ty = TypeExpr::Array(Box::new(ty));
            } else {
                self.parse_type()?;
                self.expect_punct("]")?;
                ty = TypeExpr::Opaque;
            }
        }
        Ok(ty)
    }

    fn parse_primary(&mut self) -> Result<TypeExpr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Punct("(") => {
                self.bump();
                let ty = self.parse_type()?;
                self.expect_punct(")")?;
                Ok(ty)
            }
            TokenKind::Punct("{") => {
                if self.mapped_type_ahead() {
                    self.skip_balanced("{", "}")?;
                    return Ok(TypeExpr::Opaque);
                }
                self.bump();
                Ok(TypeExpr::Object(self.parse_members(false)?))
            }
            TokenKind::Punct("[") => self.parse_tuple(),
            TokenKind::Punct("-") => {
                self.bump();
                match self.bump().kind {
                    TokenKind::Number(n) => Ok(TypeExpr::NumberLit(-n)),
                    _ => Err(self.error("expected numeric literal after `-`")),
                }
            }
            TokenKind::Str(s) => {
                self.bump();
                Ok(TypeExpr::StringLit(s))
            }
            TokenKind::Number(n) => {
                self.bump();
                Ok(TypeExpr::NumberLit(n))
            }
            TokenKind::Template => {
                self.bump();
                Ok(TypeExpr::TemplateLit)
            }
            TokenKind::Ident(word) => self.parse_named_type(&word),
            _ => Err(self.error("expected type")),
        }
    }

    fn parse_named_type(&mut self, word: &str) -> Result<TypeExpr> {
        match word {
            "true" | "false" => {
                self.bump();
                Ok(TypeExpr::BoolLit(word == "true"))
            }
            "typeof" => {
                self.bump();
                if self.peek().is_ident("import") {
                    self.parse_import_type()?;
                    return Ok(TypeExpr::Opaque);
                }
                let name = self.parse_qualified_name()?;
                self.parse_type_args()?;
                Ok(TypeExpr::Query(name))
            }
            "import" if self.peek_at(1).is_punct("(") => {
                self.parse_import_type()?;
                Ok(TypeExpr::Opaque)
            }
            _ => {
                if let Some(keyword) = Keyword::from_ident(word) {
                    if !self.peek_at(1).is_punct(".") {
                        self.bump();
                        return Ok(TypeExpr::Keyword(keyword));
                    }
                }
                let name = self.parse_qualified_name()?;
                let args = self.parse_type_args()?;
                Ok(TypeExpr::Ref { name, args })
            }
        }
    }

    fn parse_import_type(&mut self) -> Result<()> {
        self.bump();
        self.skip_balanced("(", ")")?;
        while self.eat_punct(".") {
            self.expect_name()?;
        }
        self.parse_type_args()?;
        Ok(())
    }

    fn parse_type_args(&mut self) -> Result<Vec<TypeExpr>> {
        let mut args = Vec::new();
        if !self.peek().is_punct("<") || self.peek().newline_before {
            return Ok(args);
        }
        self.bump();
        while !self.eat_punct(">") {
            args.push(self.parse_type()?);
            if !self.eat_punct(",") && !self.peek().is_punct(">") {
                return Err(self.error("expected `,` or `>` in type arguments"));
            }
        }
        Ok(args)
    }

    fn parse_tuple(&mut self) -> Result<TypeExpr> {
        self.expect_punct("[")?;
        let mut elements = Vec::new();
        while !self.eat_punct("]") {
            let rest = self.eat_punct("...");
            let labeled = matches!(self.peek().kind, TokenKind::Ident(_))
                && (self.peek_at(1).is_punct(":")
                    || (self.peek_at(1).is_punct("?") && self.peek_at(2).is_punct(":")));
            let mut optional = false;
            if labeled {
                self.bump();
                optional = self.eat_punct("?");
                self.expect_punct(":")?;
            }
            let ty = self.parse_type()?;
            optional |= self.eat_punct("?");
            elements.push(TupleElement { ty, optional, rest });
            if !self.eat_punct(",") && !self.peek().is_punct("]") {
                return Err(self.error("expected `,` or `]` in tuple type"));
            }
        }
        Ok(TypeExpr::Tuple(elements))
    }

    fn parse_qualified_name(&mut self) -> Result<Vec<String>> {
        let mut name = vec![self.expect_name()?];
        while self.peek().is_punct(".") && matches!(self.peek_at(1).kind, TokenKind::Ident(_)) {
            self.bump();
            name.push(self.expect_name()?);
        }
        Ok(name)
    }

    /// At `{`: whether this is `{ [K in ...]: ... }`, optionally with modifiers.
    fn mapped_type_ahead(&self) -> bool {
        let mut i = 1;
        while self.peek_at(i).is_ident("readonly")
            || self.peek_at(i).is_punct("+")
            || self.peek_at(i).is_punct("-")
        {
            i += 1;
        }
        self.peek_at(i).is_punct("[")
            && matches!(self.peek_at(i + 1).kind, TokenKind::Ident(_))
            && self.peek_at(i + 2).is_ident("in")
    }

    // ---------------------------------------------------------------------------
    // Skipping
    // ---------------------------------------------------------------------------

    /// Consume a balanced `open ... close` group starting at the current token.
    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<()> {
        self.expect_punct(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            if self.at_eof() {
                return Err(self.error(format!("expected `{}`", close)));
            }
            let tok = self.bump();
            if tok.is_punct(open) {
                depth += 1;
            } else if tok.is_punct(close) {
                depth -= 1;
            }
        }
        Ok(())
    }

    /// Skip an initializer expression, stopping before `,` `;` `)` `]` or `}` at
    /// depth zero.
    fn skip_initializer(&mut self) {
        let mut depth = 0usize;
        loop {
            let tok = self.peek();
            if tok.kind == TokenKind::Eof {
                return;
            }
            if depth == 0
                && (tok.is_punct(",")
                    || tok.is_punct(";")
                    || tok.is_punct(")")
                    || tok.is_punct("]")
                    || tok.is_punct("}"))
            {
                return;
            }
            if tok.is_punct("(") || tok.is_punct("[") || tok.is_punct("{") {
                depth += 1;
            } else if tok.is_punct(")") || tok.is_punct("]") || tok.is_punct("}") {
                depth -= 1;
            }
            self.bump();
        }
    }

    /// Skip to the end of the current statement.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        let mut first = true;
        loop {
            let tok = self.peek();
            if tok.kind == TokenKind::Eof {
                return;
            }
            if depth == 0 {
                if tok.is_punct(";") {
                    self.bump();
                    return;
                }
                if tok.is_punct("}") {
                    return;
                }
                let starts_statement = match &tok.kind {
                    TokenKind::Ident(word) => STATEMENT_STARTS.contains(&word.as_str()),
                    _ => false,
                };
                if !first && tok.newline_before && starts_statement {
                    return;
                }
            }
            if tok.is_punct("(") || tok.is_punct("[") || tok.is_punct("{") {
                depth += 1;
            } else if tok.is_punct(")") || tok.is_punct("]") || tok.is_punct("}") {
                depth = depth.saturating_sub(1);
            }
            first = false;
            self.bump();
        }
    }
}

/// Wrap `body` in one namespace per segment of `A.B.C`.
fn nest_namespace(mut path: Vec<String>, body: Vec<Statement>) -> Decl {
    let innermost = path.pop().unwrap_or_default();
    let mut decl = Decl::Namespace {
        name: innermost,
        body,
    };
    while let Some(outer) = path.pop() {
        decl = Decl::Namespace {
            name: outer,
            body: vec![Statement::Decl {
                decl,
                exported: true,
            }],
        };
    }
    decl
}
