//! Praat TextGrid files as written by forced aligners.
//!
//! Both the long (`xmin = 0`, `intervals [1]:`) and the short text layout
//! are accepted: the reader keeps only numbers, quoted strings and `<flag>`
//! tokens, which appear in the same order in either layout.
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use crate::error::{Error, Result};

/// A labelled time span.  Silence is an empty label.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub xmin: f64,
    pub xmax: f64,
    pub text: String,
}

impl Interval {
    pub fn duration(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn is_silent(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub time: f64,
    pub mark: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TierKind {
    Intervals(Vec<Interval>),
    Points(Vec<Point>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tier {
    pub name: String,
    pub xmin: f64,
    pub xmax: f64,
    pub kind: TierKind,
}

impl Tier {
    /// The intervals of an interval tier, `None` for a point tier.
    pub fn intervals(&self) -> Option<&[Interval]> {
        match &self.kind {
            TierKind::Intervals(v) => Some(v),
            TierKind::Points(_) => None,
        }
    }

    /// Number of intervals with a non-empty label.
    pub fn labelled_count(&self) -> usize {
        self.intervals().map_or(0, |v| v.iter().filter(|i| !i.is_silent()).count())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextGrid {
    pub xmin: f64,
    pub xmax: f64,
    pub tiers: Vec<Tier>,
}

impl TextGrid {
    pub fn tier(&self, name: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Flag(String),
}

fn read_quoted_string(chars: &mut Peekable<Chars>) -> Result<String> {
    chars.next();
    let mut out = String::new();
    loop {
        match chars.next() {
            Some('"') if chars.peek() == Some(&'"') => {
                chars.next();
                out.push('"');
            }
            Some('"') => return Ok(out),
            Some(c) => out.push(c),
            None => return Err(Error::input("unterminated string in TextGrid")),
        }
    }
}

fn read_word(chars: &mut Peekable<Chars>) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == '"' || c == '[' || c == '<' {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

fn skip_until(chars: &mut Peekable<Chars>, end: char) {
    for c in chars.by_ref() {
        if c == end {
            break;
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' => tokens.push(Token::Str(read_quoted_string(&mut chars)?)),
            '!' => skip_until(&mut chars, '\n'),
            '[' => skip_until(&mut chars, ']'),
            '<' => {
                chars.next();
                let mut flag = String::new();
                for c in chars.by_ref() {
                    if c == '>' {
                        break;
                    }
                    flag.push(c);
                }
                tokens.push(Token::Flag(flag));
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let word = read_word(&mut chars);
                let v = word
                    .parse::<f64>()
                    .map_err(|_| Error::input(format!("malformed number `{word}` in TextGrid")))?;
                tokens.push(Token::Num(v));
            }
            // Labels such as `xmin`, `=`, `intervals:` or `tiers?`.
            _ => {
                read_word(&mut chars);
            }
        }
    }
    Ok(tokens)
}

struct Cursor {
    tokens: std::vec::IntoIter<Token>,
}

impl Cursor {
    fn next(&mut self, what: &str) -> Result<Token> {
        self.tokens
            .next()
            .ok_or_else(|| Error::input(format!("TextGrid ends before {what}")))
    }

    fn num(&mut self, what: &str) -> Result<f64> {
        match self.next(what)? {
            Token::Num(v) => Ok(v),
            other => Err(Error::input(format!("expected a number for {what}, found {other:?}"))),
        }
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let v = self.num(what)?;
        if v < 0.0 || v.fract() != 0.0 {
            return Err(Error::input(format!("{what} must be a non-negative integer, got {v}")));
        }
        Ok(v as usize)
    }

    fn string(&mut self, what: &str) -> Result<String> {
        match self.next(what)? {
            Token::Str(s) => Ok(s),
            other => Err(Error::input(format!("expected a string for {what}, found {other:?}"))),
        }
    }
}

impl FromStr for TextGrid {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut cur = Cursor { tokens: tokenize(text.trim_start_matches('\u{feff}'))?.into_iter() };
        let file_type = cur.string("the file type")?;
        let class = cur.string("the object class")?;
        if file_type != "ooTextFile" || class != "TextGrid" {
            return Err(Error::input(format!("not a TextGrid text file (`{file_type}`, `{class}`)")));
        }
        let xmin = cur.num("xmin")?;
        let xmax = cur.num("xmax")?;
        let has_tiers = match cur.next("the tier flag")? {
            Token::Flag(f) => f == "exists",
            other => return Err(Error::input(format!("expected <exists> or <absent>, found {other:?}"))),
        };
        let n_tiers = if has_tiers { cur.count("the tier count")? } else { 0 };

        let mut tiers = Vec::with_capacity(n_tiers);
        for _ in 0..n_tiers {
            let class = cur.string("the tier class")?;
            let name = cur.string("the tier name")?;
            let xmin = cur.num("the tier xmin")?;
            let xmax = cur.num("the tier xmax")?;
            let n = cur.count("the item count")?;
            let kind = match class.as_str() {
                "IntervalTier" => TierKind::Intervals(
                    (0..n)
                        .map(|_| -> Result<Interval> {
                            Ok(Interval {
                                xmin: cur.num("an interval start")?,
                                xmax: cur.num("an interval end")?,
                                text: cur.string("an interval label")?,
                            })
                        })
                        .collect::<Result<_>>()?,
                ),
                "TextTier" => TierKind::Points(
                    (0..n)
                        .map(|_| -> Result<Point> {
                            Ok(Point { time: cur.num("a point time")?, mark: cur.string("a point mark")? })
                        })
                        .collect::<Result<_>>()?,
                ),
                other => return Err(Error::input(format!("tier `{name}` has unknown class `{other}`"))),
            };
            tiers.push(Tier { name, xmin, xmax, kind });
        }
        Ok(TextGrid { xmin, xmax, tiers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

xmin = 0
xmax = 1.5
tiers? <exists>
size = 2
item []:
    item [1]:
        class = "IntervalTier"
        name = "words"
        xmin = 0
        xmax = 1.5
        intervals: size = 3
        intervals [1]:
            xmin = 0
            xmax = 0.6
            text = "the ""big"""
        intervals [2]:
            xmin = 0.6
            xmax = 1.2
            text = "dog"
        intervals [3]:
            xmin = 1.2
            xmax = 1.5
            text = ""
    item [2]:
        class = "TextTier"
        name = "beats"
        xmin = 0
        xmax = 1.5
        points: size = 1
        points [1]:
            number = 0.3
            mark = "x"
"#;

    #[test]
    fn long_layout_is_parsed() {
        let tg: TextGrid = LONG.parse().unwrap();
        assert_eq!(tg.xmax, 1.5);
        assert_eq!(tg.tiers.len(), 2);
        let words = tg.tier("words").unwrap().intervals().unwrap();
        assert_eq!(words.len(), 3);
        assert_eq!(words[0].text, "the \"big\"");
        assert!(words[2].is_silent());
        approx::assert_abs_diff_eq!(words[2].duration(), 0.3, epsilon = 1e-12);
        assert_eq!(tg.tier("words").unwrap().labelled_count(), 2);
        assert!(tg.tier("beats").unwrap().intervals().is_none());
    }

    #[test]
    fn short_layout_gives_the_same_grid() {
        let short = "File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n\n0\n1.5\n<exists>\n2\n\
                     \"IntervalTier\"\n\"words\"\n0\n1.5\n3\n0\n0.6\n\"the \"\"big\"\"\"\n0.6\n1.2\n\"dog\"\n1.2\n1.5\n\"\"\n\
                     \"TextTier\"\n\"beats\"\n0\n1.5\n1\n0.3\n\"x\"\n";
        let a: TextGrid = LONG.parse().unwrap();
        let b: TextGrid = short.parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn truncated_or_foreign_files_are_input_errors() {
        let cut = &LONG[..LONG.find("intervals [3]").unwrap()];
        assert!(matches!(cut.parse::<TextGrid>(), Err(Error::Input(_))));
        let pitch = "File type = \"ooTextFile\"\nObject class = \"Pitch 1\"\n0\n1\n";
        assert!(matches!(pitch.parse::<TextGrid>(), Err(Error::Input(_))));
    }

    #[test]
    fn absent_tiers_give_an_empty_grid() {
        let tg: TextGrid = "File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n0\n2\n<absent>\n".parse().unwrap();
        assert!(tg.tiers.is_empty());
    }
}
