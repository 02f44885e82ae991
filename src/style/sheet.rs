//! Stylesheet parsing: style rules only, at-rules are skipped

use cssparser::{
    AtRuleParser, ParseError, Parser, ParserInput, ParserState, QualifiedRuleParser,
    StyleSheetParser,
};
use selectors::parser::SelectorParseErrorKind;

use crate::dom::SelectorList;
use crate::style::StyleDeclaration;

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selectors: SelectorList,
    pub declarations: StyleDeclaration,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stylesheet {
    rules: Vec<StyleRule>,
}

impl Stylesheet {
    /// Parse `css`, dropping rules whose selector is not understood.
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules_parser = RulesParser;
        let mut rules = Vec::new();
        for rule in StyleSheetParser::new(&mut parser, &mut rules_parser) {
            match rule {
                Ok(rule) => rules.push(rule),
                Err((e, text)) => log::debug!("Skipping rule `{}`: {:?}", text.trim(), e.kind),
            }
        }
        Self { rules }
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

struct RulesParser;

impl<'i> QualifiedRuleParser<'i> for RulesParser {
    type Prelude = SelectorList;
    type QualifiedRule = StyleRule;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<SelectorList, ParseError<'i, Self::Error>> {
        SelectorList::parse_from(input)
    }

    fn parse_block<'t>(
        &mut self,
        selectors: SelectorList,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<StyleRule, ParseError<'i, Self::Error>> {
        Ok(StyleRule {
            selectors,
            declarations: StyleDeclaration::parse_block(input),
        })
    }
}

// The default prelude handling rejects every at-rule, which skips it with its block.
impl<'i> AtRuleParser<'i> for RulesParser {
    type Prelude = ();
    type AtRule = StyleRule;
    type Error = SelectorParseErrorKind<'i>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules_and_skips_at_rules() {
        let sheet = Stylesheet::parse(
            "/* header */ circle { fill: red } @media print { rect { fill: blue } } .a, #b { stroke: green; stroke-width: 2 }",
        );
        assert_eq!(sheet.rules().len(), 2);
        assert_eq!(sheet.rules()[0].selectors.as_str(), "circle");
        assert_eq!(sheet.rules()[0].declarations.get_property("fill"), Some("red"));
        assert_eq!(sheet.rules()[1].declarations.len(), 2);
    }

    #[test]
    fn bad_selectors_drop_only_their_rule() {
        let sheet = Stylesheet::parse("a:hover { fill: red } rect { fill: blue }");
        assert_eq!(sheet.rules().len(), 1);
        assert_eq!(sheet.rules()[0].selectors.as_str(), "rect");
    }

    #[test]
    fn unterminated_block_closes_at_end_of_input() {
        let sheet = Stylesheet::parse("rect { fill: blue } circle { fill: red");
        assert_eq!(sheet.rules().len(), 2);
        assert_eq!(sheet.rules()[1].declarations.get_property("fill"), Some("red"));
    }

    #[test]
    fn braces_inside_strings_do_not_end_a_block() {
        let sheet = Stylesheet::parse(r#"text { font-family: "a}b" } rect { fill: red }"#);
        assert_eq!(sheet.rules().len(), 2);
        assert_eq!(
            sheet.rules()[0].declarations.get_property("font-family"),
            Some(r#""a}b""#)
        );
        assert_eq!(sheet.rules()[1].selectors.as_str(), "rect");
        assert_eq!(sheet.rules()[1].declarations.get_property("fill"), Some("red"));
    }

    #[test]
    fn comments_and_importance_inside_rules() {
        let sheet = Stylesheet::parse(
            "rect /* a */ { /* b } */ fill: red !important; stroke: url(#g) } @import url(x.css); circle{fill:blue}",
        );
        assert_eq!(sheet.rules().len(), 2);
        let rect = &sheet.rules()[0].declarations;
        assert_eq!(rect.get_property("fill"), Some("red"));
        assert!(rect.is_important("fill"));
        assert_eq!(rect.get_property("stroke"), Some("url(#g)"));
        assert_eq!(sheet.rules()[1].selectors.as_str(), "circle");
    }
}
