use thiserror::Error;

use super::token::Token;
use super::Gpr;

/*
GPR Grammar:
expression -> disjunction
disjunction -> conjunction ("OR" conjunction)* ;
conjunction -> primary ("AND" primary)* ;
primary -> GENE | "(" expression ")" ;

e.g. (Gene1 AND Gene2) OR Gene3 AND Gene4 == (Gene1 AND Gene2) OR (Gene3 AND Gene4)
 */

/// GPR Parser
pub struct GprParser {
    /// Vector of tokens from the GPR string
    tokens: Vec<Token>,
    /// Current token being processed
    current: usize,
}

impl GprParser {
    /// Create a new GprParser
    pub fn new(tokens: Vec<Token>) -> GprParser {
        GprParser { tokens, current: 0 }
    }

    // region Parsing Functions

    /// Parse the token vector into a GPR AST
    pub fn parse(&mut self) -> Result<Gpr, ParseError> {
        let gpr = self.disjunction()?;
        if !self.is_at_end() {
            // If entire expression has not been parsed, an error has occurred
            return Err(ParseError::EarlyTermination(format!("{:?}", self.peek())));
        }
        Ok(gpr)
    }

    fn disjunction(&mut self) -> Result<Gpr, ParseError> {
        let mut operands = vec![self.conjunction()?];
        while self.match_token(&Token::Or) {
            operands.push(self.conjunction()?);
        }
        Ok(Gpr::or(operands))
    }

    fn conjunction(&mut self) -> Result<Gpr, ParseError> {
        let mut operands = vec![self.primary()?];
        while self.match_token(&Token::And) {
            operands.push(self.primary()?);
        }
        Ok(Gpr::and(operands))
    }

    fn primary(&mut self) -> Result<Gpr, ParseError> {
        if let Some(identifier) = self.match_identifier() {
            return Ok(Gpr::Gene(identifier));
        }

        if self.match_token(&Token::LeftParen) {
            let expr = self.disjunction()?;
            self.consume(&Token::RightParen, "Expect ')' after expression.")?;
            return Ok(expr);
        }

        Err(ParseError::ExpectedExpression)
    }

    // endregion Parsing Functions

    // region parsing helper functions

    /// Check whether the token at the current position matches `token`,
    /// if it does advance [`self.current`] and return true, otherwise return false
    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            return true;
        }
        false
    }

    /// Similar to [`match_token`], but for matching an identifier token. If the current
    /// token is an identifier return `Some(GeneId)`, otherwise return None
    fn match_identifier(&mut self) -> Option<String> {
        if let Token::Identifier(id) = self.peek() {
            let id = id.clone();
            self.advance();
            return Some(id);
        }
        None
    }

    /// Check whether the current token matches the provided `token`
    fn check(&self, token: &Token) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek() == token
    }

    /// Advance `self.current` one position unless at the end of the token Vec
    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    /// Check whether the parser is at the end of the source Vec
    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    /// Get the current token
    fn peek(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&Token::Eof)
    }

    /// Check whether the current token matches an input token, if it matches advance to the
    /// next token, and if it doesn't return an error. Used mainly for matching parenthesis.
    fn consume(&mut self, token: &Token, msg: &str) -> Result<(), ParseError> {
        if self.check(token) {
            self.advance();
            return Ok(());
        }

        Err(ParseError::MissingToken(msg.to_string()))
    }

    // endregion parsing helper functions
}

/// Enum representing possible parse errors
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParseError {
    /// Missing expected token (e.g. a right parenthesis)
    #[error("Missing expected token: {0}")]
    MissingToken(String),
    /// No expression found when one was expected
    #[error("No expression found where one was expected, check for dangling operators")]
    ExpectedExpression,
    /// Expression was not completed when parsing terminated
    #[error("Unexpected token {0} after a complete expression, check for missing operators")]
    EarlyTermination(String),
}
