//! Cypher recursive descent parser.
//!
//! Parses a token stream into a [`Statement`]: a `Query` is a pipeline of
//! [`Segment`]s, split at every top-level `WITH`/`RETURN`. Each segment
//! collects its reading/updating clauses before the boundary.

use crate::{Error, Result};
use super::ast::*;
use super::lexer::{Token, TokenKind};

/// Parser state — wraps a token slice with cursor.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token> {
        let tok = self.peek();
        if tok.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!("Expected {:?}, got {:?} '{}'", kind, tok.kind, tok.text)))
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, msg: String) -> Error {
        Error::ParseError {
            position: self.peek().span.start,
            message: msg,
        }
    }
}

/// Parse a complete Cypher statement from tokens.
pub fn parse_statement(tokens: &[Token]) -> Result<Statement> {
    let mut p = Parser::new(tokens);

    let stmt = match p.peek_kind() {
        TokenKind::Create => {
            // Peek ahead: CREATE INDEX / CREATE CONSTRAINT -> schema command.
            let saved = p.pos;
            p.advance();
            let is_schema = p.at(TokenKind::Index) || p.at(TokenKind::Constraint);
            p.pos = saved;
            if is_schema {
                parse_schema_stmt(&mut p)?
            } else {
                Statement::Query(parse_query(&mut p)?)
            }
        }
        TokenKind::Drop => parse_schema_stmt(&mut p)?,
        _ => Statement::Query(parse_query(&mut p)?),
    };

    p.eat(TokenKind::Semicolon);
    if !p.at(TokenKind::Eof) {
        return Err(p.error(format!("Unexpected token after statement: {:?}", p.peek_kind())));
    }

    Ok(stmt)
}

// ============================================================================
// Query / segment parsing
// ============================================================================

fn parse_query(p: &mut Parser) -> Result<Query> {
    let mut segments = Vec::new();
    let mut current = Segment::default();

    loop {
        match p.peek_kind() {
            TokenKind::With => {
                p.advance();
                let projection = parse_projection(p, ProjectionKind::With)?;
                current.projection = Some(projection);
                segments.push(std::mem::take(&mut current));
            }
            TokenKind::Return => {
                p.advance();
                let projection = parse_projection(p, ProjectionKind::Return)?;
                current.projection = Some(projection);
                segments.push(std::mem::take(&mut current));
                break;
            }
            TokenKind::Eof | TokenKind::Semicolon => {
                segments.push(std::mem::take(&mut current));
                break;
            }
            _ => {
                current.clauses.push(parse_clause(p)?);
            }
        }
    }

    Ok(Query { segments })
}

fn parse_clause(p: &mut Parser) -> Result<Clause> {
    match p.peek_kind() {
        TokenKind::Match | TokenKind::OptionalMatch => parse_match_clause(p),
        TokenKind::Unwind => parse_unwind_clause(p),
        TokenKind::Call => parse_call_clause(p),
        TokenKind::Create => parse_create_clause(p),
        TokenKind::Merge => parse_merge_clause(p),
        TokenKind::Set => parse_set_clause(p),
        TokenKind::Remove => parse_remove_clause(p),
        TokenKind::Delete | TokenKind::DetachDelete => parse_delete_clause(p),
        kind => Err(p.error(format!("Unexpected token {:?} at start of clause", kind))),
    }
}

fn parse_match_clause(p: &mut Parser) -> Result<Clause> {
    let optional = if p.at(TokenKind::OptionalMatch) {
        p.advance();
        p.eat(TokenKind::Match);
        true
    } else {
        p.expect(TokenKind::Match)?;
        false
    };
    let patterns = parse_pattern_list(p)?;
    let where_clause = if p.eat(TokenKind::Where) { Some(parse_expr(p)?) } else { None };
    Ok(Clause::Match { optional, patterns, where_clause })
}

fn parse_unwind_clause(p: &mut Parser) -> Result<Clause> {
    p.expect(TokenKind::Unwind)?;
    let expr = parse_expr(p)?;
    p.expect(TokenKind::As)?;
    let alias = p.expect(TokenKind::Identifier)?.text.clone();
    Ok(Clause::Unwind { expr, alias })
}

fn parse_call_clause(p: &mut Parser) -> Result<Clause> {
    p.expect(TokenKind::Call)?;
    let mut name = p.expect(TokenKind::Identifier)?.text.clone();
    while p.eat(TokenKind::Dot) {
        let part = p.expect(TokenKind::Identifier)?.text.clone();
        name = format!("{name}.{part}");
    }

    p.expect(TokenKind::LParen)?;
    let mut args = Vec::new();
    if !p.at(TokenKind::RParen) {
        args.push(parse_expr(p)?);
        while p.eat(TokenKind::Comma) {
            args.push(parse_expr(p)?);
        }
    }
    p.expect(TokenKind::RParen)?;

    let mut yields = Vec::new();
    if p.eat(TokenKind::Yield) {
        yields.push(p.expect(TokenKind::Identifier)?.text.clone());
        while p.eat(TokenKind::Comma) {
            yields.push(p.expect(TokenKind::Identifier)?.text.clone());
        }
    }

    Ok(Clause::Call { name, args, yields })
}

fn parse_create_clause(p: &mut Parser) -> Result<Clause> {
    p.expect(TokenKind::Create)?;
    let patterns = parse_pattern_list(p)?;
    Ok(Clause::Create { patterns })
}

fn parse_merge_clause(p: &mut Parser) -> Result<Clause> {
    p.expect(TokenKind::Merge)?;
    let pattern = parse_pattern(p)?;

    let mut on_create = Vec::new();
    let mut on_match = Vec::new();

    while p.at(TokenKind::On) {
        p.advance();
        if p.at(TokenKind::Create) {
            p.advance();
            p.expect(TokenKind::Set)?;
            on_create.extend(parse_set_items(p)?);
        } else if p.at(TokenKind::Match) {
            p.advance();
            p.expect(TokenKind::Set)?;
            on_match.extend(parse_set_items(p)?);
        } else {
            return Err(p.error(format!("Expected CREATE or MATCH after ON, got '{}'", p.peek().text)));
        }
    }

    Ok(Clause::Merge { pattern, on_create, on_match })
}

fn parse_set_clause(p: &mut Parser) -> Result<Clause> {
    p.expect(TokenKind::Set)?;
    let items = parse_set_items(p)?;
    Ok(Clause::Set { items })
}

fn parse_remove_clause(p: &mut Parser) -> Result<Clause> {
    p.expect(TokenKind::Remove)?;
    let items = parse_remove_items(p)?;
    Ok(Clause::Remove { items })
}

fn parse_delete_clause(p: &mut Parser) -> Result<Clause> {
    let detach = p.at(TokenKind::DetachDelete);
    p.advance();
    if detach {
        p.eat(TokenKind::Delete);
    }
    let mut vars = vec![parse_expr(p)?];
    while p.eat(TokenKind::Comma) {
        vars.push(parse_expr(p)?);
    }
    Ok(Clause::Delete { detach, vars })
}

// ============================================================================
// Schema commands
// ============================================================================

fn parse_schema_stmt(p: &mut Parser) -> Result<Statement> {
    if p.at(TokenKind::Create) {
        p.advance();
        if p.at(TokenKind::Index) {
            p.advance();
            parse_create_index(p)
        } else if p.at(TokenKind::Constraint) {
            p.advance();
            parse_create_constraint(p)
        } else {
            Err(p.error("Expected INDEX or CONSTRAINT after CREATE".into()))
        }
    } else if p.at(TokenKind::Drop) {
        p.advance();
        if p.at(TokenKind::Index) {
            p.advance();
            parse_drop_index(p)
        } else if p.at(TokenKind::Constraint) {
            p.advance();
            parse_drop_constraint(p)
        } else {
            Err(p.error("Expected INDEX or CONSTRAINT after DROP".into()))
        }
    } else {
        Err(p.error("Expected CREATE or DROP for schema command".into()))
    }
}

fn parse_create_index(p: &mut Parser) -> Result<Statement> {
    // CREATE INDEX [name] FOR (n:Label) ON (n.property)
    // or CREATE INDEX ON :Label(property)
    if p.at(TokenKind::Identifier) && !p.at(TokenKind::On) && !p.at(TokenKind::For) {
        p.advance();
    }

    let index_type = None;

    if p.at(TokenKind::On) {
        p.advance();
        p.expect(TokenKind::Colon)?;
        let label = p.advance().text.clone();
        p.expect(TokenKind::LParen)?;
        let property = p.advance().text.clone();
        p.expect(TokenKind::RParen)?;
        return Ok(Statement::Schema(SchemaCommand::CreateIndex { label, property, index_type }));
    }

    if p.at(TokenKind::For) {
        p.advance();
        p.expect(TokenKind::LParen)?;
        p.advance(); // variable
        p.expect(TokenKind::Colon)?;
        let label = p.advance().text.clone();
        p.expect(TokenKind::RParen)?;

        p.expect(TokenKind::On)?;
        p.expect(TokenKind::LParen)?;
        p.advance(); // variable
        p.expect(TokenKind::Dot)?;
        let property = p.advance().text.clone();
        p.expect(TokenKind::RParen)?;

        if p.at(TokenKind::Identifier) && p.peek().text.eq_ignore_ascii_case("OPTIONS") {
            p.advance();
            if p.at(TokenKind::LBrace) {
                skip_braced(p)?;
            }
        }

        return Ok(Statement::Schema(SchemaCommand::CreateIndex { label, property, index_type }));
    }

    Err(p.error("Expected ON or FOR after CREATE INDEX".into()))
}

fn parse_create_constraint(p: &mut Parser) -> Result<Statement> {
    // CREATE CONSTRAINT [name] FOR (n:Label) REQUIRE n.property IS UNIQUE
    if p.at(TokenKind::Identifier) && !p.at(TokenKind::On) && !p.at(TokenKind::For) {
        p.advance();
    }

    if p.at(TokenKind::For) || p.at(TokenKind::On) {
        p.advance();
    } else {
        return Err(p.error("Expected FOR or ON after CONSTRAINT [name]".into()));
    }

    p.expect(TokenKind::LParen)?;
    p.advance(); // variable
    p.expect(TokenKind::Colon)?;
    let label = p.advance().text.clone();
    p.expect(TokenKind::RParen)?;

    p.advance(); // REQUIRE / ASSERT
    p.advance(); // variable
    p.expect(TokenKind::Dot)?;
    let property = p.advance().text.clone();

    let constraint_type = if p.at(TokenKind::Is) {
        p.advance();
        p.advance().text.to_uppercase()
    } else {
        "UNIQUE".to_string()
    };

    Ok(Statement::Schema(SchemaCommand::CreateConstraint { label, property, constraint_type }))
}

fn parse_drop_index(p: &mut Parser) -> Result<Statement> {
    if p.at(TokenKind::On) {
        p.advance();
        p.expect(TokenKind::Colon)?;
        let label = p.advance().text.clone();
        p.expect(TokenKind::LParen)?;
        let property = p.advance().text.clone();
        p.expect(TokenKind::RParen)?;
        Ok(Statement::Schema(SchemaCommand::DropIndex { label, property }))
    } else {
        let name = p.advance().text.clone();
        Ok(Statement::Schema(SchemaCommand::DropIndex { label: name, property: String::new() }))
    }
}

fn parse_drop_constraint(p: &mut Parser) -> Result<Statement> {
    if p.at(TokenKind::On) {
        p.advance();
        p.expect(TokenKind::LParen)?;
        p.advance();
        p.expect(TokenKind::Colon)?;
        let label = p.advance().text.clone();
        p.expect(TokenKind::RParen)?;
        while !p.at(TokenKind::Eof) && !p.at(TokenKind::Semicolon) {
            p.advance();
        }
        Ok(Statement::Schema(SchemaCommand::DropConstraint { label, property: String::new() }))
    } else {
        let name = p.advance().text.clone();
        Ok(Statement::Schema(SchemaCommand::DropConstraint { label: name, property: String::new() }))
    }
}

fn skip_braced(p: &mut Parser) -> Result<()> {
    p.expect(TokenKind::LBrace)?;
    let mut depth = 1u32;
    while depth > 0 && !p.at(TokenKind::Eof) {
        if p.at(TokenKind::LBrace) { depth += 1; }
        if p.at(TokenKind::RBrace) { depth -= 1; }
        if depth > 0 { p.advance(); }
    }
    p.expect(TokenKind::RBrace)?;
    Ok(())
}

// ============================================================================
// Pattern parsing
// ============================================================================

fn parse_pattern_list(p: &mut Parser) -> Result<Vec<Pattern>> {
    let mut patterns = vec![parse_pattern(p)?];
    while p.eat(TokenKind::Comma) {
        patterns.push(parse_pattern(p)?);
    }
    Ok(patterns)
}

fn parse_pattern(p: &mut Parser) -> Result<Pattern> {
    // Optional leading path variable: `p = (a)-->(b)`.
    let path_alias = if p.at(TokenKind::Identifier) {
        let saved = p.pos;
        let name = p.advance().text.clone();
        if p.eat(TokenKind::Eq) {
            Some(name)
        } else {
            p.pos = saved;
            None
        }
    } else {
        None
    };

    // `shortestPath((a)-[*]-(b))` / `allShortestPaths((a)-[*]-(b))`.
    let shortest = if p.at(TokenKind::Identifier) {
        let text = p.peek().text.to_ascii_lowercase();
        if text == "shortestpath" || text == "allshortestpaths" {
            let saved = p.pos;
            p.advance();
            if p.at(TokenKind::LParen) {
                Some(if text == "shortestpath" { ShortestPathKind::Single } else { ShortestPathKind::All })
            } else {
                p.pos = saved;
                None
            }
        } else {
            None
        }
    } else {
        None
    };

    if shortest.is_some() {
        p.expect(TokenKind::LParen)?;
    }

    let mut elements = vec![PatternElement::Node(parse_node_pattern(p)?)];
    while p.at(TokenKind::Dash) || p.at(TokenKind::LeftArrow) {
        let rel = parse_rel_pattern(p)?;
        elements.push(PatternElement::Relationship(rel));
        elements.push(PatternElement::Node(parse_node_pattern(p)?));
    }

    if shortest.is_some() {
        p.expect(TokenKind::RParen)?;
    }

    Ok(Pattern { path_alias, elements, shortest })
}

fn parse_node_pattern(p: &mut Parser) -> Result<NodePattern> {
    p.expect(TokenKind::LParen)?;

    let mut alias = None;
    let mut labels = Vec::new();
    let mut properties = Vec::new();

    if p.at(TokenKind::Identifier) {
        alias = Some(p.advance().text.clone());
    }

    while p.at(TokenKind::Colon) {
        p.advance();
        labels.push(p.expect(TokenKind::Identifier)?.text.clone());
    }

    if p.at(TokenKind::LBrace) {
        properties = parse_map_literal_inner(p)?;
    }

    p.expect(TokenKind::RParen)?;

    Ok(NodePattern { alias, labels, properties })
}

fn parse_rel_pattern(p: &mut Parser) -> Result<RelPattern> {
    let left_arrow = p.eat(TokenKind::LeftArrow);
    if !left_arrow {
        p.expect(TokenKind::Dash)?;
    }

    let mut alias = None;
    let mut rel_types = Vec::new();
    let mut properties = Vec::new();
    let mut var_length = None;

    if p.at(TokenKind::LBracket) {
        p.advance();

        if p.at(TokenKind::Identifier) {
            alias = Some(p.advance().text.clone());
        }

        if p.at(TokenKind::Colon) {
            p.advance();
            rel_types.push(p.expect(TokenKind::Identifier)?.text.clone());
            while p.eat(TokenKind::Pipe) {
                rel_types.push(p.expect(TokenKind::Identifier)?.text.clone());
            }
        }

        if p.eat(TokenKind::Star) {
            let min = if p.at(TokenKind::Integer) {
                Some(p.advance().text.parse::<usize>().unwrap_or(1))
            } else {
                None
            };
            if p.eat(TokenKind::DotDot) {
                let max = if p.at(TokenKind::Integer) {
                    Some(p.advance().text.parse::<usize>().unwrap_or(100))
                } else {
                    None
                };
                var_length = Some(VarLength { min, max });
            } else if let Some(n) = min {
                var_length = Some(VarLength { min: Some(n), max: Some(n) });
            } else {
                var_length = Some(VarLength { min: None, max: None });
            }
        }

        if p.at(TokenKind::LBrace) {
            properties = parse_map_literal_inner(p)?;
        }

        p.expect(TokenKind::RBracket)?;
    }

    let direction = if left_arrow {
        p.eat(TokenKind::Dash);
        PatternDirection::Left
    } else if p.eat(TokenKind::Arrow) {
        PatternDirection::Right
    } else if p.eat(TokenKind::Dash) {
        PatternDirection::Both
    } else {
        PatternDirection::Right
    };

    Ok(RelPattern { alias, rel_types, direction, properties, var_length })
}

// ============================================================================
// Projection (WITH / RETURN), ORDER BY, SET/REMOVE item parsing
// ============================================================================

fn parse_projection(p: &mut Parser, kind: ProjectionKind) -> Result<Projection> {
    let distinct = p.eat(TokenKind::Distinct);
    let mut items = Vec::new();

    if p.at(TokenKind::Star) {
        p.advance();
        items.push(ReturnItem { expr: Expr::Star, alias: None });
    } else {
        items.push(parse_return_item(p)?);
        while p.eat(TokenKind::Comma) {
            items.push(parse_return_item(p)?);
        }
    }

    let where_clause = if p.eat(TokenKind::Where) { Some(parse_expr(p)?) } else { None };

    let order_by = if p.at(TokenKind::Order) {
        p.advance();
        p.expect(TokenKind::By)?;
        parse_order_by(p)?
    } else {
        Vec::new()
    };

    let skip = if p.eat(TokenKind::Skip) { Some(parse_expr(p)?) } else { None };
    let limit = if p.eat(TokenKind::Limit) { Some(parse_expr(p)?) } else { None };

    Ok(Projection { kind, distinct, items, where_clause, order_by, skip, limit })
}

fn parse_return_item(p: &mut Parser) -> Result<ReturnItem> {
    let expr = parse_expr(p)?;
    let alias = if p.eat(TokenKind::As) {
        Some(p.expect(TokenKind::Identifier)?.text.clone())
    } else {
        None
    };
    Ok(ReturnItem { expr, alias })
}

fn parse_order_by(p: &mut Parser) -> Result<Vec<OrderExpr>> {
    let mut exprs = vec![parse_order_expr(p)?];
    while p.eat(TokenKind::Comma) {
        exprs.push(parse_order_expr(p)?);
    }
    Ok(exprs)
}

fn parse_order_expr(p: &mut Parser) -> Result<OrderExpr> {
    let expr = parse_expr(p)?;
    let ascending = if p.eat(TokenKind::Desc) {
        false
    } else {
        p.eat(TokenKind::Asc);
        true
    };
    Ok(OrderExpr { expr, ascending })
}

fn parse_set_items(p: &mut Parser) -> Result<Vec<SetItem>> {
    let mut items = vec![parse_set_item(p)?];
    while p.eat(TokenKind::Comma) {
        items.push(parse_set_item(p)?);
    }
    Ok(items)
}

fn parse_set_item(p: &mut Parser) -> Result<SetItem> {
    let name = p.expect(TokenKind::Identifier)?.text.clone();

    if p.eat(TokenKind::Dot) {
        let key = p.expect(TokenKind::Identifier)?.text.clone();
        p.expect(TokenKind::Eq)?;
        let value = parse_expr(p)?;
        Ok(SetItem::Property { variable: name, key, value })
    } else if p.eat(TokenKind::PlusEq) {
        let value = parse_expr(p)?;
        Ok(SetItem::MergeProperties { variable: name, value })
    } else if p.eat(TokenKind::Eq) {
        let value = parse_expr(p)?;
        Ok(SetItem::AllProperties { variable: name, value })
    } else if p.at(TokenKind::Colon) {
        p.advance();
        let label = p.expect(TokenKind::Identifier)?.text.clone();
        Ok(SetItem::Label { variable: name, label })
    } else {
        Err(p.error("Expected '.', '=', '+=', or ':' after SET variable".into()))
    }
}

fn parse_remove_items(p: &mut Parser) -> Result<Vec<RemoveItem>> {
    let mut items = vec![parse_remove_item(p)?];
    while p.eat(TokenKind::Comma) {
        items.push(parse_remove_item(p)?);
    }
    Ok(items)
}

fn parse_remove_item(p: &mut Parser) -> Result<RemoveItem> {
    let name = p.expect(TokenKind::Identifier)?.text.clone();

    if p.eat(TokenKind::Dot) {
        let key = p.expect(TokenKind::Identifier)?.text.clone();
        Ok(RemoveItem::Property { variable: name, key })
    } else if p.at(TokenKind::Colon) {
        p.advance();
        let label = p.expect(TokenKind::Identifier)?.text.clone();
        Ok(RemoveItem::Label { variable: name, label })
    } else {
        Err(p.error("Expected '.' or ':' after REMOVE variable".into()))
    }
}

// ============================================================================
// Expression parsing (precedence climbing)
// ============================================================================

fn parse_expr(p: &mut Parser) -> Result<Expr> {
    parse_or_expr(p)
}

fn parse_or_expr(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_xor_expr(p)?;
    while p.at(TokenKind::Or) {
        p.advance();
        let right = parse_xor_expr(p)?;
        left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Or, right: Box::new(right) };
    }
    Ok(left)
}

fn parse_xor_expr(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_and_expr(p)?;
    while p.at(TokenKind::Xor) {
        p.advance();
        let right = parse_and_expr(p)?;
        left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Xor, right: Box::new(right) };
    }
    Ok(left)
}

fn parse_and_expr(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_not_expr(p)?;
    while p.at(TokenKind::And) {
        p.advance();
        let right = parse_not_expr(p)?;
        left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::And, right: Box::new(right) };
    }
    Ok(left)
}

fn parse_not_expr(p: &mut Parser) -> Result<Expr> {
    if p.eat(TokenKind::Not) {
        let expr = parse_not_expr(p)?;
        Ok(Expr::UnaryOp { op: UnaryOp::Not, expr: Box::new(expr) })
    } else {
        parse_comparison(p)
    }
}

fn parse_comparison(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_string_op(p)?;

    if p.at(TokenKind::Is) {
        p.advance();
        let negated = p.eat(TokenKind::Not);
        p.expect(TokenKind::Null)?;
        return Ok(Expr::IsNull { expr: Box::new(left), negated });
    }

    if p.at(TokenKind::In) {
        p.advance();
        let list = parse_addition(p)?;
        return Ok(Expr::In { expr: Box::new(left), list: Box::new(list) });
    }

    let op = match p.peek_kind() {
        TokenKind::Eq => Some(BinaryOp::Eq),
        TokenKind::Neq => Some(BinaryOp::Neq),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::Lte => Some(BinaryOp::Lte),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::Gte => Some(BinaryOp::Gte),
        TokenKind::RegexMatch => Some(BinaryOp::RegexMatch),
        _ => None,
    };

    if let Some(op) = op {
        p.advance();
        let right = parse_string_op(p)?;
        left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
    }

    Ok(left)
}

/// `STARTS WITH` / `ENDS WITH` are two keyword tokens, not one — the lexer
/// has no dedicated token for them, so detect the `Identifier("STARTS"|"ENDS") + With`
/// sequence here.
fn parse_string_op(p: &mut Parser) -> Result<Expr> {
    let left = parse_addition(p)?;

    if p.at(TokenKind::Contains) {
        p.advance();
        let right = parse_addition(p)?;
        return Ok(Expr::StringOp { left: Box::new(left), op: StringOp::Contains, right: Box::new(right) });
    }
    if p.at(TokenKind::Identifier) && p.peek().text.eq_ignore_ascii_case("STARTS") {
        p.advance();
        p.expect(TokenKind::With)?;
        let right = parse_addition(p)?;
        return Ok(Expr::StringOp { left: Box::new(left), op: StringOp::StartsWith, right: Box::new(right) });
    }
    if p.at(TokenKind::Identifier) && p.peek().text.eq_ignore_ascii_case("ENDS") {
        p.advance();
        p.expect(TokenKind::With)?;
        let right = parse_addition(p)?;
        return Ok(Expr::StringOp { left: Box::new(left), op: StringOp::EndsWith, right: Box::new(right) });
    }

    Ok(left)
}

fn parse_addition(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_multiplication(p)?;
    loop {
        let op = match p.peek_kind() {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            _ => break,
        };
        p.advance();
        let right = parse_multiplication(p)?;
        left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
    }
    Ok(left)
}

fn parse_multiplication(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_power(p)?;
    loop {
        let op = match p.peek_kind() {
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            _ => break,
        };
        p.advance();
        let right = parse_power(p)?;
        left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
    }
    Ok(left)
}

fn parse_power(p: &mut Parser) -> Result<Expr> {
    let left = parse_unary(p)?;
    if p.eat(TokenKind::Caret) {
        let right = parse_power(p)?; // right-associative
        Ok(Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Pow, right: Box::new(right) })
    } else {
        Ok(left)
    }
}

fn parse_unary(p: &mut Parser) -> Result<Expr> {
    if p.eat(TokenKind::Minus) {
        let expr = parse_property_access(p)?;
        Ok(Expr::UnaryOp { op: UnaryOp::Negate, expr: Box::new(expr) })
    } else {
        parse_property_access(p)
    }
}

fn parse_property_access(p: &mut Parser) -> Result<Expr> {
    let mut expr = parse_primary(p)?;

    while p.at(TokenKind::Dot) {
        p.advance();
        let key = p.expect(TokenKind::Identifier)?.text.clone();
        expr = Expr::Property { expr: Box::new(expr), key };
    }

    if p.at(TokenKind::Colon) {
        if let Expr::Variable(_) = &expr {
            p.advance();
            let label = p.expect(TokenKind::Identifier)?.text.clone();
            expr = Expr::HasLabel { expr: Box::new(expr), label };
        }
    }

    Ok(expr)
}

fn parse_primary(p: &mut Parser) -> Result<Expr> {
    match p.peek_kind() {
        TokenKind::Integer => {
            let tok = p.advance();
            let val = tok.text.parse::<i64>().map_err(|_| {
                Error::ParseError { position: tok.span.start, message: "invalid integer literal".into() }
            })?;
            Ok(Expr::Literal(Literal::Int(val)))
        }
        TokenKind::Float => {
            let tok = p.advance();
            let val = tok.text.parse::<f64>().map_err(|_| {
                Error::ParseError { position: tok.span.start, message: "invalid float literal".into() }
            })?;
            Ok(Expr::Literal(Literal::Float(val)))
        }
        TokenKind::StringLiteral => {
            let tok = p.advance();
            Ok(Expr::Literal(Literal::String(tok.text.clone())))
        }
        TokenKind::True => {
            p.advance();
            Ok(Expr::Literal(Literal::Bool(true)))
        }
        TokenKind::False => {
            p.advance();
            Ok(Expr::Literal(Literal::Bool(false)))
        }
        TokenKind::Null => {
            p.advance();
            Ok(Expr::Literal(Literal::Null))
        }

        TokenKind::Parameter => {
            let tok = p.advance();
            Ok(Expr::Parameter(tok.text.clone()))
        }

        TokenKind::Star => {
            p.advance();
            Ok(Expr::Star)
        }

        TokenKind::LParen => {
            p.advance();
            let expr = parse_expr(p)?;
            p.expect(TokenKind::RParen)?;
            Ok(expr)
        }

        TokenKind::LBracket => parse_list_or_comprehension(p),

        TokenKind::LBrace => {
            let map = parse_map_literal_inner(p)?;
            Ok(Expr::MapLiteral(map))
        }

        TokenKind::Case => {
            p.advance();
            let operand = if !p.at(TokenKind::When) {
                Some(Box::new(parse_expr(p)?))
            } else {
                None
            };
            let mut whens = Vec::new();
            while p.eat(TokenKind::When) {
                let when_expr = parse_expr(p)?;
                p.expect(TokenKind::Then)?;
                let then_expr = parse_expr(p)?;
                whens.push((when_expr, then_expr));
            }
            let else_expr = if p.eat(TokenKind::Else) {
                Some(Box::new(parse_expr(p)?))
            } else {
                None
            };
            p.expect(TokenKind::End)?;
            Ok(Expr::Case { operand, whens, else_expr })
        }

        TokenKind::Exists => {
            p.advance();
            if p.eat(TokenKind::LBrace) {
                p.eat(TokenKind::Match);
                let pattern = parse_pattern(p)?;
                let where_clause = if p.eat(TokenKind::Where) {
                    Some(Box::new(parse_expr(p)?))
                } else {
                    None
                };
                p.expect(TokenKind::RBrace)?;
                Ok(Expr::Exists { pattern: Box::new(pattern), where_clause })
            } else {
                p.expect(TokenKind::LParen)?;
                let pattern = parse_pattern(p)?;
                p.expect(TokenKind::RParen)?;
                Ok(Expr::Exists { pattern: Box::new(pattern), where_clause: None })
            }
        }

        TokenKind::All | TokenKind::Any | TokenKind::NoneOf | TokenKind::Single => {
            let kind = match p.advance().kind {
                TokenKind::All => PredicateKind::All,
                TokenKind::Any => PredicateKind::Any,
                TokenKind::NoneOf => PredicateKind::None,
                TokenKind::Single => PredicateKind::Single,
                _ => unreachable!(),
            };
            p.expect(TokenKind::LParen)?;
            let variable = p.expect(TokenKind::Identifier)?.text.clone();
            p.expect(TokenKind::In)?;
            let list = Box::new(parse_expr(p)?);
            p.expect(TokenKind::Where)?;
            let predicate = Box::new(parse_expr(p)?);
            p.expect(TokenKind::RParen)?;
            Ok(Expr::Predicate { kind, variable, list, predicate })
        }

        TokenKind::Identifier => {
            let tok = p.advance().clone();
            let after_first = p.pos;

            // A dotted chain immediately followed by `(` is a qualified
            // function name (`point.distance(...)`, `apoc.convert.toJson(...)`,
            // `duration.between(...)`), not property access — property access
            // never takes argument lists. Without this, the dotted entries in
            // the function registry would be unreachable from query text.
            let mut name = tok.text.clone();
            while p.at(TokenKind::Dot) {
                let saved = p.pos;
                p.advance();
                if p.at(TokenKind::Identifier) {
                    name.push('.');
                    name.push_str(&p.advance().text.clone());
                } else {
                    p.pos = saved;
                    break;
                }
            }

            if p.at(TokenKind::LParen) {
                p.advance();
                let mut args = Vec::new();
                let distinct = p.eat(TokenKind::Distinct);

                if p.at(TokenKind::Star) {
                    p.advance();
                } else if !p.at(TokenKind::RParen) {
                    args.push(parse_expr(p)?);
                    while p.eat(TokenKind::Comma) {
                        args.push(parse_expr(p)?);
                    }
                }
                p.expect(TokenKind::RParen)?;
                Ok(Expr::FunctionCall { name, args, distinct })
            } else {
                // Not a call after all — undo the dotted lookahead so the
                // surrounding property-access loop sees the same `.field.field`
                // chain it would have without this lookahead.
                p.pos = after_first;
                Ok(Expr::Variable(tok.text))
            }
        }

        _ => Err(p.error(format!("Unexpected token in expression: {:?} '{}'", p.peek_kind(), p.peek().text))),
    }
}

/// `[expr, expr, ...]` list literal, or `[x IN list WHERE pred | transform]`
/// list comprehension — disambiguated by looking for `Identifier IN` right
/// after the bracket.
fn parse_list_or_comprehension(p: &mut Parser) -> Result<Expr> {
    p.expect(TokenKind::LBracket)?;

    let is_comprehension = p.at(TokenKind::Identifier) && {
        let saved = p.pos;
        p.advance();
        let is_in = p.at(TokenKind::In);
        p.pos = saved;
        is_in
    };

    if is_comprehension {
        let variable = p.advance().text.clone();
        p.expect(TokenKind::In)?;
        let list = Box::new(parse_expr(p)?);
        let predicate = if p.eat(TokenKind::Where) {
            Some(Box::new(parse_expr(p)?))
        } else {
            None
        };
        let transform = if p.eat(TokenKind::Pipe) {
            Some(Box::new(parse_expr(p)?))
        } else {
            None
        };
        p.expect(TokenKind::RBracket)?;
        return Ok(Expr::ListComprehension { variable, list, predicate, transform });
    }

    let mut items = Vec::new();
    if !p.at(TokenKind::RBracket) {
        items.push(parse_expr(p)?);
        while p.eat(TokenKind::Comma) {
            items.push(parse_expr(p)?);
        }
    }
    p.expect(TokenKind::RBracket)?;
    Ok(Expr::List(items))
}

fn parse_map_literal_inner(p: &mut Parser) -> Result<Vec<(String, Expr)>> {
    p.expect(TokenKind::LBrace)?;
    let mut entries = Vec::new();
    if !p.at(TokenKind::RBrace) {
        let key = p.expect(TokenKind::Identifier)?.text.clone();
        p.expect(TokenKind::Colon)?;
        let value = parse_expr(p)?;
        entries.push((key, value));
        while p.eat(TokenKind::Comma) {
            let key = p.expect(TokenKind::Identifier)?.text.clone();
            p.expect(TokenKind::Colon)?;
            let value = parse_expr(p)?;
            entries.push((key, value));
        }
    }
    p.expect(TokenKind::RBrace)?;
    Ok(entries)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher::lexer::tokenize;

    fn parse(query: &str) -> Result<Statement> {
        let tokens = tokenize(query)?;
        parse_statement(&tokens)
    }

    fn only_segment(stmt: &Statement) -> &Segment {
        match stmt {
            Statement::Query(q) => q.segments.last().unwrap(),
            _ => panic!("expected Query"),
        }
    }

    #[test]
    fn test_simple_match_return() {
        let stmt = parse("MATCH (n:Person) RETURN n").unwrap();
        let seg = only_segment(&stmt);
        assert_eq!(seg.clauses.len(), 1);
        assert!(matches!(&seg.clauses[0], Clause::Match { patterns, .. } if patterns.len() == 1));
        assert_eq!(seg.projection.as_ref().unwrap().items.len(), 1);
    }

    #[test]
    fn test_match_with_where() {
        let stmt = parse("MATCH (n:Person) WHERE n.age > 30 RETURN n.name").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { where_clause, .. } => assert!(where_clause.is_some()),
            _ => panic!("expected Match"),
        }
    }

    #[test]
    fn test_create_node() {
        let stmt = parse("CREATE (n:Person {name: 'Ada', age: 3})").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Create { patterns } => {
                assert_eq!(patterns.len(), 1);
                if let PatternElement::Node(np) = &patterns[0].elements[0] {
                    assert_eq!(np.labels, vec!["Person"]);
                    assert_eq!(np.properties.len(), 2);
                } else {
                    panic!("expected node element");
                }
            }
            _ => panic!("expected Create"),
        }
        assert!(seg.projection.is_none());
    }

    #[test]
    fn test_create_return() {
        let stmt = parse("CREATE (n:Person {name: 'Ada'}) RETURN n").unwrap();
        let seg = only_segment(&stmt);
        assert!(seg.projection.is_some());
        assert!(matches!(&seg.clauses[0], Clause::Create { .. }));
    }

    #[test]
    fn test_relationship_pattern() {
        let stmt = parse("MATCH (a:Person)-[:KNOWS]->(b:Person) RETURN a, b").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { patterns, .. } => assert_eq!(patterns[0].elements.len(), 3),
            _ => panic!("expected Match"),
        }
        assert_eq!(seg.projection.as_ref().unwrap().items.len(), 2);
    }

    #[test]
    fn test_match_set() {
        let stmt = parse("MATCH (n:Person) WHERE n.name = 'Ada' SET n.age = 4").unwrap();
        let seg = only_segment(&stmt);
        assert_eq!(seg.clauses.len(), 2);
        assert!(matches!(&seg.clauses[0], Clause::Match { .. }));
        match &seg.clauses[1] {
            Clause::Set { items } => assert_eq!(items.len(), 1),
            _ => panic!("expected Set"),
        }
    }

    #[test]
    fn test_match_delete() {
        let stmt = parse("MATCH (n:Person) WHERE n.name = 'Ada' DETACH DELETE n").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[1] {
            Clause::Delete { detach, vars } => {
                assert!(detach);
                assert_eq!(vars.len(), 1);
            }
            _ => panic!("expected Delete"),
        }
    }

    #[test]
    fn test_return_with_limit() {
        let stmt = parse("MATCH (n:Person) RETURN n LIMIT 10").unwrap();
        let seg = only_segment(&stmt);
        assert!(seg.projection.as_ref().unwrap().limit.is_some());
    }

    #[test]
    fn test_count_aggregate() {
        let stmt = parse("MATCH (n:Person) RETURN count(n)").unwrap();
        let seg = only_segment(&stmt);
        if let Expr::FunctionCall { name, .. } = &seg.projection.as_ref().unwrap().items[0].expr {
            assert_eq!(name, "count");
        } else {
            panic!("expected function call");
        }
    }

    #[test]
    fn test_parameter() {
        let stmt = parse("MATCH (n:Person) WHERE n.name = $name RETURN n").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { where_clause: Some(Expr::BinaryOp { right, .. }), .. } => {
                assert!(matches!(right.as_ref(), Expr::Parameter(_)));
            }
            _ => panic!("expected Match with where clause"),
        }
    }

    #[test]
    fn test_multiple_labels() {
        let stmt = parse("MATCH (n:Person:Employee) RETURN n").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { patterns, .. } => {
                if let PatternElement::Node(np) = &patterns[0].elements[0] {
                    assert_eq!(np.labels, vec!["Person", "Employee"]);
                }
            }
            _ => panic!("expected Match"),
        }
    }

    #[test]
    fn test_order_by() {
        let stmt = parse("MATCH (n:Person) RETURN n.name ORDER BY n.name DESC").unwrap();
        let seg = only_segment(&stmt);
        let order = &seg.projection.as_ref().unwrap().order_by;
        assert!(!order[0].ascending);
    }

    #[test]
    fn test_return_alias() {
        let stmt = parse("MATCH (n:Person) RETURN n.name AS name").unwrap();
        let seg = only_segment(&stmt);
        assert_eq!(seg.projection.as_ref().unwrap().items[0].alias.as_deref(), Some("name"));
    }

    #[test]
    fn test_boolean_expression() {
        let stmt = parse("MATCH (n) WHERE n.active = true AND n.age > 18 RETURN n").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { where_clause, .. } => {
                assert!(matches!(where_clause, Some(Expr::BinaryOp { op: BinaryOp::And, .. })));
            }
            _ => panic!("expected Match"),
        }
    }

    #[test]
    fn test_list_literal() {
        let stmt = parse("MATCH (n) WHERE n.id IN [1, 2, 3] RETURN n").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { where_clause, .. } => assert!(matches!(where_clause, Some(Expr::In { .. }))),
            _ => panic!("expected Match"),
        }
    }

    #[test]
    fn test_is_null() {
        let stmt = parse("MATCH (n) WHERE n.email IS NOT NULL RETURN n").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { where_clause: Some(Expr::IsNull { negated, .. }), .. } => assert!(*negated),
            _ => panic!("expected IsNull expression"),
        }
    }

    #[test]
    fn test_return_star() {
        let stmt = parse("MATCH (n:Person) RETURN *").unwrap();
        let seg = only_segment(&stmt);
        assert!(matches!(&seg.projection.as_ref().unwrap().items[0].expr, Expr::Star));
    }

    #[test]
    fn test_with_clause_chain() {
        let stmt = parse("MATCH (n:Person) WITH n.name AS name RETURN name").unwrap();
        match &stmt {
            Statement::Query(q) => {
                assert_eq!(q.segments.len(), 2);
                let with_proj = q.segments[0].projection.as_ref().unwrap();
                assert_eq!(with_proj.kind, ProjectionKind::With);
                assert_eq!(with_proj.items[0].alias.as_deref(), Some("name"));
            }
            _ => panic!("expected Query"),
        }
    }

    #[test]
    fn test_with_clause_where() {
        let stmt = parse("MATCH (n:Person) WITH n.name AS name WHERE name = 'Alice' RETURN name").unwrap();
        match &stmt {
            Statement::Query(q) => {
                assert!(q.segments[0].projection.as_ref().unwrap().where_clause.is_some());
            }
            _ => panic!("expected Query"),
        }
    }

    #[test]
    fn test_with_clause_multiple_segments() {
        let stmt = parse("MATCH (n:Person) WITH n.name AS name WITH name RETURN name").unwrap();
        match &stmt {
            Statement::Query(q) => assert_eq!(q.segments.len(), 3),
            _ => panic!("expected Query"),
        }
    }

    #[test]
    fn test_remove_property() {
        let stmt = parse("MATCH (n:Person) WHERE n.name = 'Alice' REMOVE n.age").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[1] {
            Clause::Remove { items } => match &items[0] {
                RemoveItem::Property { variable, key } => {
                    assert_eq!(variable, "n");
                    assert_eq!(key, "age");
                }
                _ => panic!("expected RemoveItem::Property"),
            },
            _ => panic!("expected Remove"),
        }
    }

    #[test]
    fn test_remove_label() {
        let stmt = parse("MATCH (n:Person) REMOVE n:Employee").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[1] {
            Clause::Remove { items } => match &items[0] {
                RemoveItem::Label { variable, label } => {
                    assert_eq!(variable, "n");
                    assert_eq!(label, "Employee");
                }
                _ => panic!("expected RemoveItem::Label"),
            },
            _ => panic!("expected Remove"),
        }
    }

    #[test]
    fn test_remove_multiple_items() {
        let stmt = parse("MATCH (n:Person) REMOVE n.age, n:Employee").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[1] {
            Clause::Remove { items } => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[0], RemoveItem::Property { .. }));
                assert!(matches!(&items[1], RemoveItem::Label { .. }));
            }
            _ => panic!("expected Remove"),
        }
    }

    #[test]
    fn test_merge_on_create_on_match() {
        let stmt = parse(
            "MERGE (n:Person {name: 'Ada'}) ON CREATE SET n.created = true ON MATCH SET n.seen = true RETURN n",
        ).unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Merge { on_create, on_match, .. } => {
                assert_eq!(on_create.len(), 1);
                assert_eq!(on_match.len(), 1);
            }
            _ => panic!("expected Merge"),
        }
    }

    #[test]
    fn test_starts_with_ends_with() {
        let stmt = parse("MATCH (n) WHERE n.name STARTS WITH 'A' AND n.name ENDS WITH 'e' RETURN n").unwrap();
        let seg = only_segment(&stmt);
        assert!(matches!(
            &seg.clauses[0],
            Clause::Match { where_clause: Some(Expr::BinaryOp { op: BinaryOp::And, .. }), .. }
        ));
    }

    #[test]
    fn test_variable_length_path() {
        let stmt = parse("MATCH (a)-[:KNOWS*1..3]->(b) RETURN a, b").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { patterns, .. } => {
                if let PatternElement::Relationship(rel) = &patterns[0].elements[1] {
                    let vl = rel.var_length.as_ref().unwrap();
                    assert_eq!(vl.min, Some(1));
                    assert_eq!(vl.max, Some(3));
                } else {
                    panic!("expected relationship element");
                }
            }
            _ => panic!("expected Match"),
        }
    }

    #[test]
    fn test_path_variable() {
        let stmt = parse("MATCH p = (a)-[:KNOWS]->(b) RETURN p").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { patterns, .. } => assert_eq!(patterns[0].path_alias.as_deref(), Some("p")),
            _ => panic!("expected Match"),
        }
    }

    #[test]
    fn test_unwind_clause() {
        let stmt = parse("UNWIND [1, 2, 3] AS x RETURN x").unwrap();
        let seg = only_segment(&stmt);
        assert!(matches!(&seg.clauses[0], Clause::Unwind { alias, .. } if alias == "x"));
    }

    #[test]
    fn test_list_comprehension() {
        let stmt = parse("MATCH (n) RETURN [x IN n.tags WHERE x <> 'x' | x]").unwrap();
        let seg = only_segment(&stmt);
        assert!(matches!(
            &seg.projection.as_ref().unwrap().items[0].expr,
            Expr::ListComprehension { .. }
        ));
    }

    #[test]
    fn test_any_predicate() {
        let stmt = parse("MATCH (n) WHERE ANY(x IN n.tags WHERE x = 'a') RETURN n").unwrap();
        let seg = only_segment(&stmt);
        match &seg.clauses[0] {
            Clause::Match { where_clause: Some(Expr::Predicate { kind, .. }), .. } => {
                assert_eq!(*kind, PredicateKind::Any);
            }
            _ => panic!("expected Predicate"),
        }
    }
}
