use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Fields, Value};
use crate::query::ast::{Command, Target};
use crate::query::lexer::Lexer;
use crate::query::token::{Token, TokenKind};

/// Recursive-descent parser with one token of lookahead.
///
/// Stops at the first deviation from the grammar; there is no recovery, so
/// a bad line yields one error and no command.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Parser { lexer, current }
    }

    /// Parse a single command line.
    pub fn parse(input: &str) -> Result<Command> {
        Parser::new(input).parse_command()
    }

    pub fn parse_command(&mut self) -> Result<Command> {
        if self.current.kind != TokenKind::Ident {
            return Err(self.unexpected("command name"));
        }
        let verb = self.advance().text;

        let command = match verb.as_str() {
            "list" => Command::List(self.parse_target()?),
            "select" => self.parse_select()?,
            "create" => {
                let target = self.parse_target()?;
                let name = self.expect_ident("name")?;
                Command::Create { target, name }
            }
            "delete" => self.parse_delete()?,
            "insert" => self.parse_insert()?,
            "modify" => self.parse_modify()?,
            "find" => self.parse_find()?,
            "import" => Command::Import {
                path: self.expect_path()?,
            },
            "export" => {
                let target = self.expect_ident("export target")?;
                let path = self.expect_path()?;
                Command::Export { target, path }
            }
            other => {
                return Err(Error::new(
                    ErrorKind::Syntax,
                    format!("unknown command '{}'", other),
                ));
            }
        };

        if self.current.kind != TokenKind::Eof {
            return Err(self.unexpected("end of input"));
        }
        Ok(command)
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::syntax(expected, &self.current.to_string(), self.current.offset)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind != kind {
            return Err(self.unexpected(&kind.to_string()));
        }
        Ok(self.advance())
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        if !self.current.is_keyword(word) {
            return Err(self.unexpected(&format!("'{}'", word)));
        }
        self.advance();
        Ok(())
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        if self.current.kind != TokenKind::Ident {
            return Err(self.unexpected(what));
        }
        Ok(self.advance().text)
    }

    fn expect_path(&mut self) -> Result<String> {
        match self.current.kind {
            TokenKind::Ident | TokenKind::Str => Ok(self.advance().text),
            _ => Err(self.unexpected("file path")),
        }
    }

    fn parse_target(&mut self) -> Result<Target> {
        let target = match self.current.kind {
            TokenKind::Ident => Target::from_keyword(&self.current.text),
            _ => None,
        };
        match target {
            Some(target) => {
                self.advance();
                Ok(target)
            }
            None => Err(self.unexpected("db, collections or documents")),
        }
    }

    fn parse_select(&mut self) -> Result<Command> {
        if self.current.kind == TokenKind::Asterisk {
            self.advance();
            self.expect_keyword("from")?;
            let document = self.expect_ident("document name")?;
            return Ok(Command::SelectAll { document });
        }
        match self.parse_target() {
            Ok(Target::Database) => Ok(Command::SelectDatabase(self.expect_ident("database name")?)),
            Ok(Target::Collection) => Ok(Command::SelectCollection(self.expect_ident("collection name")?)),
            _ => Err(self.unexpected("db, collection or '*'")),
        }
    }

    fn parse_delete(&mut self) -> Result<Command> {
        if matches!(self.current.kind, TokenKind::LBrace | TokenKind::LBracket) {
            let filter = self.parse_props()?;
            let document = self.parse_in_document()?;
            return Ok(Command::DeleteObjects { filter, document });
        }
        let target = self.parse_target()?;
        let name = self.expect_ident("name")?;
        Ok(Command::Delete { target, name })
    }

    // insert [{name:Luis, age:18}, {...}] in document registro
    // insert {company:IBM} for {id:0} in document registro
    fn parse_insert(&mut self) -> Result<Command> {
        let objects = self.parse_props()?;
        let filter = if self.current.is_keyword("for") {
            self.advance();
            Some(self.parse_props()?)
        } else {
            None
        };
        let document = self.parse_in_document()?;
        Ok(Command::Insert { objects, filter, document })
    }

    // modify {age:30} for {id:1} in document registro
    fn parse_modify(&mut self) -> Result<Command> {
        let patch = self.parse_props()?;
        self.expect_keyword("for")?;
        let filter = self.parse_props()?;
        let document = self.parse_in_document()?;
        Ok(Command::Modify { patch, filter, document })
    }

    // find "name:Luis" "city:Cali" in clientes usuarios
    fn parse_find(&mut self) -> Result<Command> {
        let mut queries = Vec::new();
        while self.current.kind == TokenKind::Str {
            queries.push(self.advance().text);
        }

        let mut collections = Vec::new();
        if self.current.is_keyword("in") {
            self.advance();
            collections.push(self.expect_ident("collection name")?);
        }
        while self.current.kind == TokenKind::Ident {
            collections.push(self.advance().text);
        }
        Ok(Command::Find { queries, collections })
    }

    fn parse_in_document(&mut self) -> Result<String> {
        self.expect_keyword("in")?;
        self.expect_keyword("document")?;
        self.expect_ident("document name")
    }

    /// `{..}` or `[{..}, {..}]`
    fn parse_props(&mut self) -> Result<Vec<Fields>> {
        match self.current.kind {
            TokenKind::LBrace => Ok(vec![self.parse_object()?]),
            TokenKind::LBracket => {
                self.advance();
                let mut objects = vec![self.parse_object()?];
                while self.current.kind == TokenKind::Comma {
                    self.advance();
                    objects.push(self.parse_object()?);
                }
                self.expect(TokenKind::RBracket)?;
                Ok(objects)
            }
            _ => Err(self.unexpected("'{' or '['")),
        }
    }

    fn parse_object(&mut self) -> Result<Fields> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Fields::new();
        if self.current.kind == TokenKind::RBrace {
            self.advance();
            return Ok(fields);
        }
        loop {
            let key = match self.current.kind {
                TokenKind::Ident | TokenKind::Str => self.advance().text,
                _ => return Err(self.unexpected("field name")),
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_value()?;
            fields.insert(key, value);

            if self.current.kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            self.expect(TokenKind::RBrace)?;
            return Ok(fields);
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.current.kind {
            TokenKind::Str => Ok(Value::Text(self.advance().text)),
            TokenKind::Number => {
                let token = self.advance();
                parse_number(&token)
            }
            TokenKind::Ident => {
                let token = self.advance();
                Ok(match token.text.as_str() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    "null" => Value::Null,
                    _ => Value::Text(token.text),
                })
            }
            _ => Err(self.unexpected("value")),
        }
    }
}

fn parse_number(token: &Token) -> Result<Value> {
    let invalid = || {
        Error::new(
            ErrorKind::Syntax,
            format!("invalid number literal '{}' at offset {}", token.text, token.offset),
        )
    };
    if token.text.contains('.') {
        token.text.parse::<f64>().map(Value::Float).map_err(|_| invalid())
    } else {
        token.text.parse::<i64>().map(Value::Integer).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::fields;

    fn syntax_error(input: &str) -> String {
        let err = Parser::parse(input).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax, "{}", input);
        err.context
    }

    #[test]
    fn structural_commands() {
        assert_eq!(Parser::parse("list db").unwrap(), Command::List(Target::Database));
        assert_eq!(Parser::parse("LIST Collections").unwrap(), Command::List(Target::Collection));
        assert_eq!(Parser::parse("select db Ventas").unwrap(), Command::SelectDatabase("ventas".into()));
        assert_eq!(Parser::parse("select collection clientes").unwrap(), Command::SelectCollection("clientes".into()));
        assert_eq!(
            Parser::parse("select * from registro").unwrap(),
            Command::SelectAll { document: "registro".into() }
        );
        assert_eq!(
            Parser::parse("create documents registro").unwrap(),
            Command::Create { target: Target::Document, name: "registro".into() }
        );
        assert_eq!(
            Parser::parse("delete db ventas").unwrap(),
            Command::Delete { target: Target::Database, name: "ventas".into() }
        );
    }

    #[test]
    fn insert_single_and_list() {
        let cmd = Parser::parse(r#"insert {name:"Pedro", eps:colfamilia} in document registro"#).unwrap();
        assert_eq!(
            cmd,
            Command::Insert {
                objects: vec![fields([("name", "Pedro"), ("eps", "colfamilia")])],
                filter: None,
                document: "registro".into(),
            }
        );

        let cmd = Parser::parse("insert [{name:Luis, age:18}, {}] in document registro").unwrap();
        let Command::Insert { objects, .. } = cmd else { panic!("not an insert") };
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0]["name"], Value::Text("luis".into()));
        assert_eq!(objects[0]["age"], Value::Integer(18));
        assert!(objects[1].is_empty());
    }

    #[test]
    fn insert_with_filter() {
        let cmd = Parser::parse("insert {company:ibm} for {id:0} in document registro").unwrap();
        let Command::Insert { filter, .. } = cmd else { panic!("not an insert") };
        assert_eq!(filter, Some(vec![fields([("id", 0i64)])]));
    }

    #[test]
    fn value_shapes() {
        let cmd = Parser::parse(r#"modify {a:1, b:-2.5, c:true, d:false, e:null, f:"X y", "G":word} for {_id:1} in document d"#).unwrap();
        let Command::Modify { patch, filter, .. } = cmd else { panic!("not a modify") };
        let patch = &patch[0];
        assert_eq!(patch["a"], Value::Integer(1));
        assert_eq!(patch["b"], Value::Float(-2.5));
        assert_eq!(patch["c"], Value::Boolean(true));
        assert_eq!(patch["d"], Value::Boolean(false));
        assert_eq!(patch["e"], Value::Null);
        assert_eq!(patch["f"], Value::Text("X y".into()));
        assert_eq!(patch["G"], Value::Text("word".into()));
        assert_eq!(filter, vec![fields([("_id", 1i64)])]);
    }

    #[test]
    fn find_forms() {
        assert_eq!(
            Parser::parse(r#"find "name:Luis""#).unwrap(),
            Command::Find { queries: vec!["name:Luis".into()], collections: vec![] }
        );
        assert_eq!(
            Parser::parse(r#"find "name:Luis" "city:New York" in clientes usuarios"#).unwrap(),
            Command::Find {
                queries: vec!["name:Luis".into(), "city:New York".into()],
                collections: vec!["clientes".into(), "usuarios".into()],
            }
        );
    }

    #[test]
    fn import_export_and_object_delete() {
        assert_eq!(
            Parser::parse(r#"import "Backups/Ventas.json""#).unwrap(),
            Command::Import { path: "Backups/Ventas.json".into() }
        );
        assert_eq!(
            Parser::parse("export collection out/clientes.json").unwrap(),
            Command::Export { target: "collection".into(), path: "out/clientes.json".into() }
        );
        assert_eq!(
            Parser::parse("delete {id:3} in document registro").unwrap(),
            Command::DeleteObjects { filter: vec![fields([("id", 3i64)])], document: "registro".into() }
        );
    }

    #[test]
    fn malformed_lines_fail_with_one_error() {
        let msg = syntax_error("insert {name:Luis in document x");
        assert!(msg.contains("expected '}'"), "{}", msg);

        syntax_error("");
        syntax_error("list");
        syntax_error("list tables");
        syntax_error("select * registro");
        syntax_error("modify {a:1} in document x");
        syntax_error("insert [] in document x");
        syntax_error("insert {a:1,} in document x");
        syntax_error("insert {a:1} in doc x");
        syntax_error("create db");
        syntax_error("list db extra");
        syntax_error("frobnicate db");
        syntax_error("42");
    }

    #[test]
    fn illegal_characters_surface() {
        let msg = syntax_error("insert {a:1}; in document x");
        assert!(msg.contains("illegal character ';'"), "{}", msg);
        let msg = syntax_error("select db ventas#");
        assert!(msg.contains("illegal character '#'"), "{}", msg);
    }

    #[test]
    fn bad_numbers_are_fatal() {
        syntax_error("insert {a:99999999999999999999} in document x");
        let cmd = Parser::parse("insert {a:7.} in document x").unwrap();
        let Command::Insert { objects, .. } = cmd else { panic!("not an insert") };
        assert_eq!(objects[0]["a"], Value::Float(7.0));
    }

    #[test]
    fn floats_render_without_exponents() {
        let cmd = Parser::parse("insert {a:10000000000000000.0, b:0.00001, c:2.0} in document d").unwrap();
        assert_eq!(
            cmd.to_string(),
            r#"insert {"a": 10000000000000000.0, "b": 0.00001, "c": 2.0} in document d"#
        );
    }

    #[test]
    fn rendering_reparses_to_the_same_command() {
        let lines = [
            "list documents",
            "select db ventas",
            "select collection clientes",
            "select * from registro",
            "create collection clientes",
            "delete document registro",
            r#"delete [{id:1}, {name:"Ana"}] in document registro"#,
            r#"insert [{name:"Pedro", age:30, score:1.0}, {ok:true, none:null}] in document registro"#,
            r#"insert {"Company":"IBM"} for {id:0} in document registro"#,
            r#"modify {age:-31, ratio:0.25} for {name:"Luis"} in document registro"#,
            "insert [{big:10000000000000000.0}, {tiny:0.00001}, {neg:-123456789012345680000.5}] in document d",
            r#"find "name:Luis" "eps:colsanitas" in clientes usuarios"#,
            r#"import "dump/ventas.json""#,
            r#"export db "dump/Ventas.json""#,
        ];
        for line in lines {
            let cmd = Parser::parse(line).unwrap();
            let rendered = cmd.to_string();
            assert_eq!(Parser::parse(&rendered).unwrap(), cmd, "{} -> {}", line, rendered);
        }
    }
}
