


/* ---------------------------------------------------------------
  ╰┈➤    lock key resolution
   ---------------------------------------------------------------
    every coordinated operation declares which key it locks, either as
    a closure over its own argument struct or as a template like
    `shortlist:{shortlistId}` evaluated against the named arguments of
    the call, the receiver itself can be bound under the name `this`.

    resolution is pure, a template referencing a name the call doesn't
    bind, or a template that can't be parsed, is an error and the lock
    is never attempted.
*/

use std::collections::BTreeMap;
use crate::consts::RECEIVER_BINDING;
use crate::error::KeyResolutionError;


pub trait KeyResolver<A: ?Sized>{
    fn resolve(&self, args: &A) -> Result<String, KeyResolutionError>;
}

// closures are the plain way of declaring a key
impl<A: ?Sized, F> KeyResolver<A> for F
where F: Fn(&A) -> Result<String, KeyResolutionError>{
    fn resolve(&self, args: &A) -> Result<String, KeyResolutionError> {
        self(args)
    }
}

// pins the closure signature so call sites don't have to spell out the return type
pub fn key_fn<A: ?Sized, F>(f: F) -> F
where F: Fn(&A) -> Result<String, KeyResolutionError>{
    f
}


#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArgBindings{
    values: BTreeMap<String, String>,
}

impl ArgBindings{

    pub fn new() -> Self{
        Self::default()
    }

    pub fn bind(mut self, name: &str, value: impl ToString) -> Self{
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn bind_this(self, receiver: impl ToString) -> Self{
        self.bind(RECEIVER_BINDING, receiver)
    }

    pub fn get(&self, name: &str) -> Option<&str>{
        self.values.get(name).map(|v| v.as_str())
    }
}


#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment{
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyTemplate{
    source: String,
    segments: Vec<Segment>,
}

fn is_name_char(c: char, first: bool) -> bool{
    if first{
        c.is_ascii_alphabetic() || c == '_'
    } else{
        c.is_ascii_alphanumeric() || c == '_' || c == '.'
    }
}

impl KeyTemplate{

    pub fn parse(template: &str) -> Result<Self, KeyResolutionError>{

        let malformed = |reason: &str| KeyResolutionError::Malformed{
            template: template.to_string(),
            reason: reason.to_string()
        };

        if template.trim().is_empty(){
            return Err(malformed("template is empty"));
        }

        let mut segments = vec![];
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next(){
            match c{
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                },
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                },
                '}' => return Err(malformed("unmatched `}`")),
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref(){
                        if n == '}'{
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed{
                        return Err(malformed("unclosed `{`"));
                    }
                    let name = name.trim().to_string();
                    if name.is_empty(){
                        return Err(malformed("empty placeholder"));
                    }
                    let valid = name.chars().enumerate().all(|(i, ch)| is_name_char(ch, i == 0));
                    if !valid{
                        return Err(malformed(&format!("invalid placeholder name `{}`", name)));
                    }
                    if !literal.is_empty(){
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Param(name));
                },
                other => literal.push(other),
            }
        }
        if !literal.is_empty(){
            segments.push(Segment::Literal(literal));
        }

        Ok(Self{ source: template.to_string(), segments })
    }

    pub fn as_str(&self) -> &str{
        &self.source
    }

    // names this template needs bound, in order of appearance
    pub fn params(&self) -> Vec<&str>{
        self.segments.iter().filter_map(|s| match s{
            Segment::Param(p) => Some(p.as_str()),
            Segment::Literal(_) => None,
        }).collect()
    }
}

impl KeyResolver<ArgBindings> for KeyTemplate{
    fn resolve(&self, args: &ArgBindings) -> Result<String, KeyResolutionError> {

        let mut key = String::new();
        for segment in &self.segments{
            match segment{
                Segment::Literal(l) => key.push_str(l),
                Segment::Param(p) => {
                    let value = args.get(p).ok_or_else(|| KeyResolutionError::Unbound{
                        template: self.source.clone(),
                        name: p.clone()
                    })?;
                    key.push_str(value);
                }
            }
        }

        if key.trim().is_empty(){
            return Err(KeyResolutionError::Empty{ template: self.source.clone() });
        }
        Ok(key)
    }
}

// one shot version, parses then resolves
pub fn resolve(template: &str, bindings: &ArgBindings) -> Result<String, KeyResolutionError>{
    KeyTemplate::parse(template)?.resolve(bindings)
}
