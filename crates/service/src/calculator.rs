//! Four-function calculator whose state survives restarts through the `KvProvider`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::records::{Committed, StorageNotice};
use crate::storage::KvProvider;

pub const DISPLAY_KEY: &str = "vk_calc_display";
pub const PREV_KEY: &str = "vk_calc_prev";
pub const OP_KEY: &str = "vk_calc_op";
pub const RESET_KEY: &str = "vk_calc_reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "×")]
    Multiply,
    #[serde(rename = "÷")]
    Divide,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "×",
            Operator::Divide => "÷",
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Subtract => lhs - rhs,
            Operator::Multiply => lhs * rhs,
            Operator::Divide => lhs / rhs,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Subtract),
            "×" | "*" | "x" => Some(Operator::Multiply),
            "÷" | "/" => Some(Operator::Divide),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One button on the keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// `0`-`9` or `.`
    Digit(char),
    Op(Operator),
    Equals,
    Clear,
    Negate,
    Percent,
}

impl FromStr for Key {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_digit() || c == '.' {
                return Ok(Key::Digit(c));
            }
        }
        if let Some(op) = Operator::parse(s) {
            return Ok(Key::Op(op));
        }
        match s {
            "=" => Ok(Key::Equals),
            "AC" | "ac" => Ok(Key::Clear),
            "+/-" => Ok(Key::Negate),
            "%" => Ok(Key::Percent),
            _ => Err(ServiceError::Validation(format!("unknown calculator key: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorState {
    pub display: String,
    pub prev: Option<String>,
    pub op: Option<Operator>,
    pub should_reset: bool,
}

impl Default for CalculatorState {
    fn default() -> Self {
        Self { display: "0".into(), prev: None, op: None, should_reset: false }
    }
}

impl CalculatorState {
    pub fn press(&mut self, key: Key) {
        match key {
            Key::Digit(c) => {
                if self.display == "0" || self.should_reset {
                    self.display = c.to_string();
                    self.should_reset = false;
                } else {
                    self.display.push(c);
                }
            }
            Key::Op(op) => {
                self.prev = Some(self.display.clone());
                self.op = Some(op);
                self.should_reset = true;
            }
            Key::Equals => {
                let (Some(prev), Some(op)) = (self.prev.as_deref(), self.op) else {
                    return;
                };
                let result = op.apply(parse_number(prev), parse_number(&self.display));
                self.display = format_number(result);
                self.prev = None;
                self.op = None;
                self.should_reset = true;
            }
            Key::Clear => {
                self.display = "0".into();
                self.prev = None;
                self.op = None;
            }
            Key::Negate => self.display = format_number(parse_number(&self.display) * -1.0),
            Key::Percent => self.display = format_number(parse_number(&self.display) / 100.0),
        }
    }
}

/// Leading-number parse: `"12.5abc"` is 12.5, nothing numeric is NaN.
fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if let Ok(v) = s.parse::<f64>() {
        return v;
    }
    (1..s.len())
        .rev()
        .filter(|end| s.is_char_boundary(*end))
        .find_map(|end| s[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Shortest text that reads back as `v`, without a trailing `.0`.
fn format_number(v: f64) -> String {
    if v.is_nan() {
        return "NaN".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity".into() } else { "-Infinity".into() };
    }
    if v == 0.0 {
        return "0".into();
    }
    let abs = v.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let exp = format!("{v:e}");
        return match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => format!("{mantissa}e+{power}"),
            _ => exp,
        };
    }
    format!("{v}")
}

/// Calculator session persisted under the four `vk_calc_*` keys after every press.
pub struct Calculator {
    state: Mutex<CalculatorState>,
    provider: Arc<dyn KvProvider>,
}

impl Calculator {
    pub async fn open(provider: Arc<dyn KvProvider>) -> Arc<Self> {
        let state = restore(provider.as_ref()).await;
        debug!(display = %state.display, "calculator restored");
        Arc::new(Self { state: Mutex::new(state), provider })
    }

    pub async fn state(&self) -> CalculatorState {
        self.state.lock().await.clone()
    }

    pub async fn press(&self, key: Key) -> Committed<CalculatorState> {
        let mut state = self.state.lock().await;
        state.press(key);
        let notice = self.persist(&state).await;
        Committed { value: state.clone(), notice }
    }

    async fn persist(&self, state: &CalculatorState) -> Option<StorageNotice> {
        let p = self.provider.as_ref();
        let results = [
            p.set(DISPLAY_KEY, state.display.clone()).await,
            match &state.prev {
                Some(prev) => p.set(PREV_KEY, prev.clone()).await,
                None => p.remove(PREV_KEY).await,
            },
            match state.op {
                Some(op) => p.set(OP_KEY, op.symbol().to_string()).await,
                None => p.remove(OP_KEY).await,
            },
            p.set(RESET_KEY, state.should_reset.to_string()).await,
        ];
        let err = results.into_iter().find_map(Result::err)?;
        warn!(error = %err, "calculator state not persisted");
        Some(StorageNotice::from(&err))
    }
}

async fn restore(provider: &dyn KvProvider) -> CalculatorState {
    let display = read(provider, DISPLAY_KEY).await.unwrap_or_else(|| "0".into());
    let prev = read(provider, PREV_KEY).await;
    let op = read(provider, OP_KEY).await.and_then(|s| Operator::parse(&s));
    let should_reset = read(provider, RESET_KEY).await.as_deref() == Some("true");
    CalculatorState { display, prev, op, should_reset }
}

async fn read(provider: &dyn KvProvider, key: &str) -> Option<String> {
    match provider.get(key).await {
        Ok(v) => v.filter(|s| !s.is_empty()),
        Err(e) => {
            warn!(error = %e, key, "calculator key unreadable");
            None
        }
    }
}
