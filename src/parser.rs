//! Recursive-descent parser with diagnostic recovery.
//!
//! Grounded line-for-line on the original prototype's `parse.py`: the
//! six-case `initial_error_checks` table, the stopping-symbol recovery
//! discipline, and the near-identical `device_list`/`connection_list`/
//! `monitor_list` idiom (here unified into one [`Parser::parse_delimited_list`]
//! helper instead of three separate functions).

use crate::devices::{DeviceKindTag, Devices, MakeDeviceError, Qualifier};
use crate::monitors::{MakeMonitorError, Monitors};
use crate::names::{NameId, Names};
use crate::network::Network;
use crate::scanner::{Scanner, Symbol, TokenKind};

/// Every distinct diagnosable condition, assigned a fixed message and,
/// via [`Parser::code_of`], a place in the shared error-code namespace
/// allocated through [`Names::unique_error_codes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoDevicesKeyword,
    NoConnectionsKeyword,
    NoMonitorsKeyword,
    NoEndKeyword,
    NoBraceOpen,
    NoBraceClose,
    InvalidName,
    NoEquals,
    InvalidComponent,
    NoBracketOpen,
    NoBracketClose,
    NoNumber,
    ClockOutOfRange,
    SwitchOutOfRange,
    UndefinedName,
    NoFullStop,
    NoSemicolon,
    NoQOrQbar,
    NoInputSuffix,
    SymbolAfterEnd,
    EmptyFile,
    Terminate,
    DeviceSemantic,
    ConnectionSemantic,
    MonitorSemantic,
    ArityOutOfRange,
    RcOutOfRange,
    SigGenInvalid,
    EmptyDeviceList,
}

impl ErrorKind {
    fn message(&self) -> &'static str {
        match self {
            ErrorKind::NoDevicesKeyword => "Expected the keyword DEVICES",
            ErrorKind::NoConnectionsKeyword => "Expected the keyword CONNECTIONS",
            ErrorKind::NoMonitorsKeyword => "Expected the keyword MONITORS",
            ErrorKind::NoEndKeyword => "Expected the keyword END",
            ErrorKind::NoBraceOpen => "Expected a '{' symbol",
            ErrorKind::NoBraceClose => "Expected a '}' symbol",
            ErrorKind::InvalidName => "Expected a valid name",
            ErrorKind::NoEquals => "Expected an '=' symbol",
            ErrorKind::InvalidComponent => "Expected a valid device type",
            ErrorKind::NoBracketOpen => "Expected a '(' symbol",
            ErrorKind::NoBracketClose => "Expected a ')' symbol",
            ErrorKind::NoNumber => "Expected a positive number",
            ErrorKind::ClockOutOfRange => "Expected a clock half-period of at least 1",
            ErrorKind::SwitchOutOfRange => "Expected a switch value of 0 or 1",
            ErrorKind::UndefinedName => "Name has not been defined as a device",
            ErrorKind::NoFullStop => "Expected a '.' symbol",
            ErrorKind::NoSemicolon => "Expected a semicolon",
            ErrorKind::NoQOrQbar => "Expected Q or QBAR after '.'",
            ErrorKind::NoInputSuffix => "Expected a valid input port suffix",
            ErrorKind::SymbolAfterEnd => "Expected no further symbols after END",
            ErrorKind::EmptyFile => "Cannot parse an empty file",
            ErrorKind::Terminate => "Unexpected end of file during error recovery",
            ErrorKind::DeviceSemantic => "Invalid device definition",
            ErrorKind::ConnectionSemantic => "Invalid connection",
            ErrorKind::MonitorSemantic => "Invalid monitor",
            ErrorKind::ArityOutOfRange => "Expected an input count between 1 and 16",
            ErrorKind::RcOutOfRange => "Expected an RC period of at least 1",
            ErrorKind::SigGenInvalid => "Expected at least one nonzero run-length",
            ErrorKind::EmptyDeviceList => "Expected at least one device in DEVICES",
        }
    }
}

/// Outcome of a full parse: the reconstructed subsystems plus whether
/// the network is ready to simulate.
pub struct ParseOutcome {
    pub success: bool,
    pub error_count: usize,
    pub names: Names,
    pub devices: Devices,
    pub network: Network,
    pub monitors: Monitors,
}

pub struct Parser {
    names: Names,
    scanner: Scanner,
    devices: Devices,
    network: Network,
    monitors: Monitors,
    current: Symbol,
    error_count: usize,
    error_code_base: usize,
}

const STOPPING_AT_SEMICOLON_BRACE_KEYWORD: &[TokenKind] =
    &[TokenKind::Semicolon, TokenKind::BraceClose, TokenKind::Keyword];

impl Parser {
    pub fn new(mut names: Names, mut scanner: Scanner) -> Self {
        let error_code_base = names
            .unique_error_codes(28)
            .expect("error code allocation should never overflow")
            .start;
        let current = scanner.next_symbol(&mut names);
        Parser {
            names,
            scanner,
            devices: Devices::new(),
            network: Network::new(),
            monitors: Monitors::new(),
            current,
            error_count: 0,
            error_code_base,
        }
    }

    fn code_of(&self, kind: ErrorKind) -> usize {
        self.error_code_base + kind as usize
    }

    fn advance(&mut self) {
        self.current = self.scanner.next_symbol(&mut self.names);
    }

    fn is_keyword(&self, symbol: &Symbol, word: &str) -> bool {
        symbol.kind == TokenKind::Keyword && symbol.id == Some(self.names.reserved(word))
    }

    /// Reports `kind` at `symbol`, then recovers: if `proceed` is true
    /// the error is already locally absorbed and parsing continues
    /// immediately; otherwise symbols are discarded up to one of
    /// `stopping_types` (or EOF, which raises `Terminate`).
    fn display_error(&mut self, symbol: Symbol, kind: ErrorKind, proceed: bool, stopping_types: &[TokenKind]) {
        self.error_count += 1;
        let code = self.code_of(kind);
        eprintln!("\n  Line {}: [{}] {}", symbol.line, code, kind.message());
        if !symbol.is_eof() {
            self.scanner.display_line_and_marker(&symbol, &self.names, &mut std::io::stderr());
        }
        self.error_recovery(proceed, stopping_types);
    }

    fn error_recovery(&mut self, proceed: bool, stopping_types: &[TokenKind]) {
        if proceed {
            return;
        }
        while !stopping_types.contains(&self.current.kind) {
            if self.current.is_eof() {
                self.error_count += 1;
                eprintln!("\n  Line {}: [{}] {}", self.current.line, self.code_of(ErrorKind::Terminate), ErrorKind::Terminate.message());
                return;
            }
            self.advance();
        }
    }

    /// The six-case table shared by `device_list`, `connection_list`,
    /// and `monitor_list`: checks for `KEYWORD '{'`, reporting the
    /// appropriate combination of a missing-keyword and/or
    /// missing-brace error, and consuming whatever opening tokens were
    /// actually present. The caller always proceeds to parse the list
    /// body afterward, regardless of which case fired - a missing
    /// brace does not forfeit the rest of the section, it just means
    /// the body is scanned starting wherever the cursor now sits.
    fn initial_error_checks(&mut self, keyword: &'static str, missing_keyword: ErrorKind) {
        let saw_keyword = self.is_keyword(&self.current, keyword);
        if saw_keyword {
            self.advance();
        }
        let saw_brace = self.current.kind == TokenKind::BraceOpen;

        match (saw_keyword, saw_brace) {
            (true, true) => {
                self.advance();
            }
            (true, false) => {
                self.display_error(self.current, ErrorKind::NoBraceOpen, true, &[]);
            }
            (false, true) => {
                self.display_error(self.current, missing_keyword, true, &[]);
                self.advance();
            }
            (false, false) => {
                self.display_error(self.current, missing_keyword, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            }
        }
    }

    /// Shared list-parsing idiom: parse one item via `parse_item`,
    /// require a semicolon between items, and loop until `}` or a
    /// structural failure forces recovery to the next stopping symbol.
    /// `require_non_empty`, when given, reports that error if the list
    /// turns out to have zero items (DEVICES requires at least one;
    /// CONNECTIONS and MONITORS do not).
    fn parse_delimited_list<F: FnMut(&mut Self)>(&mut self, require_non_empty: Option<ErrorKind>, mut parse_item: F) {
        if let Some(empty_kind) = require_non_empty {
            if self.current.kind == TokenKind::BraceClose || self.current.is_eof() {
                self.display_error(self.current, empty_kind, true, &[]);
            }
        }
        loop {
            if self.current.kind == TokenKind::BraceClose || self.current.is_eof() {
                break;
            }
            parse_item(self);
            if self.current.kind == TokenKind::Semicolon {
                self.advance();
            } else if self.current.kind != TokenKind::BraceClose {
                self.display_error(self.current, ErrorKind::NoSemicolon, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
                if self.current.kind == TokenKind::Semicolon {
                    self.advance();
                }
            }
        }
        if self.current.kind == TokenKind::BraceClose {
            self.advance();
        } else {
            self.display_error(self.current, ErrorKind::NoBraceClose, true, &[]);
        }
    }

    fn expect_name(&mut self) -> Option<NameId> {
        if self.current.kind == TokenKind::Name {
            let id = self.current.id;
            self.advance();
            id
        } else {
            self.display_error(self.current, ErrorKind::InvalidName, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            None
        }
    }

    fn expect_number(&mut self) -> Option<u32> {
        if self.current.kind == TokenKind::Number {
            let text = self.current.id.and_then(|id| self.names.get_name_string(id)).unwrap_or("0").to_string();
            self.advance();
            text.parse().ok()
        } else {
            self.display_error(self.current, ErrorKind::NoNumber, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            None
        }
    }

    fn tag_for_current_keyword(&self) -> Option<DeviceKindTag> {
        const KEYWORDS: &[(&str, DeviceKindTag)] = &[
            ("AND", DeviceKindTag::And),
            ("NAND", DeviceKindTag::Nand),
            ("OR", DeviceKindTag::Or),
            ("NOR", DeviceKindTag::Nor),
            ("XOR", DeviceKindTag::Xor),
            ("DTYPE", DeviceKindTag::Dtype),
            ("SWITCH", DeviceKindTag::Switch),
            ("CLOCK", DeviceKindTag::Clock),
            ("SIGGEN", DeviceKindTag::SigGen),
            ("RC", DeviceKindTag::Rc),
        ];
        KEYWORDS.iter().find(|(word, _)| self.is_keyword(&self.current, word)).map(|(_, tag)| *tag)
    }

    /// `device := NAME '=' deviceSpec`
    fn parse_device(&mut self) {
        let Some(name_id) = self.expect_name() else { return };

        if self.current.kind != TokenKind::Equals {
            self.display_error(self.current, ErrorKind::NoEquals, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return;
        }
        self.advance();

        let Some(tag) = self.tag_for_current_keyword() else {
            self.display_error(self.current, ErrorKind::InvalidComponent, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return;
        };
        self.advance();

        let qualifier = match tag {
            DeviceKindTag::And | DeviceKindTag::Nand | DeviceKindTag::Or | DeviceKindTag::Nor => {
                match self.parse_bracketed_number() {
                    Some(n) => Qualifier::Count(n),
                    None => return,
                }
            }
            DeviceKindTag::Xor | DeviceKindTag::Dtype => Qualifier::None,
            DeviceKindTag::Switch => match self.parse_bracketed_bit(ErrorKind::SwitchOutOfRange) {
                Some(b) => Qualifier::Bit(b),
                None => return,
            },
            DeviceKindTag::Clock => match self.parse_bracketed_number() {
                Some(n) => Qualifier::Count(n),
                None => return,
            },
            DeviceKindTag::Rc => match self.parse_bracketed_number() {
                Some(n) => Qualifier::Count(n),
                None => return,
            },
            DeviceKindTag::SigGen => match self.parse_siggen_qualifier() {
                Some(q) => q,
                None => return,
            },
        };

        if let Err(err) = self.devices.make_device(&mut self.names, name_id, tag, qualifier) {
            let kind = match err {
                MakeDeviceError::ArityOutOfRange => ErrorKind::ArityOutOfRange,
                MakeDeviceError::ClockOutOfRange => ErrorKind::ClockOutOfRange,
                MakeDeviceError::RcOutOfRange => ErrorKind::RcOutOfRange,
                MakeDeviceError::SigGenInvalid => ErrorKind::SigGenInvalid,
                _ => ErrorKind::DeviceSemantic,
            };
            self.display_error(self.current, kind, true, &[]);
        }
    }

    fn parse_bracketed_number(&mut self) -> Option<u32> {
        if self.current.kind != TokenKind::BracketOpen {
            self.display_error(self.current, ErrorKind::NoBracketOpen, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return None;
        }
        self.advance();
        let n = self.expect_number()?;
        if self.current.kind != TokenKind::BracketClose {
            self.display_error(self.current, ErrorKind::NoBracketClose, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return None;
        }
        self.advance();
        Some(n)
    }

    fn parse_bracketed_bit(&mut self, out_of_range: ErrorKind) -> Option<bool> {
        let n = self.parse_bracketed_number()?;
        if n > 1 {
            self.display_error(self.current, out_of_range, true, &[]);
            return None;
        }
        Some(n == 1)
    }

    /// `SIGGEN '(' NUMBER ',' '[' NUMBER (',' NUMBER)* ']' ')'`
    fn parse_siggen_qualifier(&mut self) -> Option<Qualifier> {
        if self.current.kind != TokenKind::BracketOpen {
            self.display_error(self.current, ErrorKind::NoBracketOpen, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return None;
        }
        self.advance();
        let initial = self.expect_number()?;
        if initial > 1 {
            self.display_error(self.current, ErrorKind::SwitchOutOfRange, true, &[]);
            return None;
        }
        if self.current.kind != TokenKind::Comma {
            self.display_error(self.current, ErrorKind::NoEquals, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return None;
        }
        self.advance();

        if self.current.kind != TokenKind::SquareOpen {
            self.display_error(self.current, ErrorKind::NoBracketOpen, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return None;
        }
        self.advance();

        let mut run_lengths = vec![self.expect_number()?];
        while self.current.kind == TokenKind::Comma {
            self.advance();
            run_lengths.push(self.expect_number()?);
        }

        if self.current.kind != TokenKind::SquareClose {
            self.display_error(self.current, ErrorKind::NoBracketClose, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return None;
        }
        self.advance();

        if self.current.kind != TokenKind::BracketClose {
            self.display_error(self.current, ErrorKind::NoBracketClose, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return None;
        }
        self.advance();

        Some(Qualifier::SigGen { initial_level: initial == 1, run_lengths })
    }

    /// `output := NAME ('.' ('Q'|'QBAR'))?`
    fn parse_output(&mut self) -> Option<(NameId, Option<NameId>)> {
        let device_id = self.expect_name()?;
        if self.current.kind != TokenKind::Dot {
            return Some((device_id, None));
        }
        self.advance();
        if self.is_keyword(&self.current, "Q") || self.is_keyword(&self.current, "QBAR") {
            let port = self.current.id;
            self.advance();
            Some((device_id, port))
        } else {
            self.display_error(self.current, ErrorKind::NoQOrQbar, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            None
        }
    }

    /// `input := NAME '.' inputPort`
    fn parse_input(&mut self) -> Option<(NameId, NameId)> {
        let device_id = self.expect_name()?;
        if self.current.kind != TokenKind::Dot {
            self.display_error(self.current, ErrorKind::NoFullStop, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return None;
        }
        self.advance();

        let is_valid_suffix = self.current.kind == TokenKind::Keyword
            && self.current.id.and_then(|id| self.names.get_name_string(id)).map_or(false, |s| {
                s == "DATA" || s == "CLK" || s == "SET" || s == "CLEAR" || (s.starts_with('I') && s[1..].parse::<u32>().is_ok())
            });

        if is_valid_suffix {
            let port = self.current.id.unwrap();
            self.advance();
            Some((device_id, port))
        } else {
            self.display_error(self.current, ErrorKind::NoInputSuffix, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            None
        }
    }

    fn parse_connection(&mut self) {
        let Some((out_dev, out_port)) = self.parse_output() else { return };
        if self.current.kind != TokenKind::Equals {
            self.display_error(self.current, ErrorKind::NoEquals, false, STOPPING_AT_SEMICOLON_BRACE_KEYWORD);
            return;
        }
        self.advance();
        let Some((in_dev, in_port)) = self.parse_input() else { return };

        if let Err(_err) = self.network.make_connection(&mut self.devices, out_dev, out_port, in_dev, in_port) {
            self.display_error(self.current, ErrorKind::ConnectionSemantic, true, &[]);
        }
    }

    fn parse_monitor(&mut self, cycles_elapsed: usize) {
        let Some((dev, port)) = self.parse_output() else { return };
        if let Err(err) = self.monitors.make_monitor(&self.devices, dev, port, cycles_elapsed) {
            let kind = match err {
                MakeMonitorError::DeviceAbsent => ErrorKind::UndefinedName,
                _ => ErrorKind::MonitorSemantic,
            };
            self.display_error(self.current, kind, true, &[]);
        }
    }

    fn parse_device_list(&mut self) {
        self.initial_error_checks("DEVICES", ErrorKind::NoDevicesKeyword);
        self.parse_delimited_list(Some(ErrorKind::EmptyDeviceList), |p| p.parse_device());
    }

    fn parse_connection_list(&mut self) {
        self.initial_error_checks("CONNECTIONS", ErrorKind::NoConnectionsKeyword);
        self.parse_delimited_list(None, |p| p.parse_connection());
    }

    fn parse_monitor_list(&mut self) {
        let cycles_elapsed = 0;
        self.initial_error_checks("MONITORS", ErrorKind::NoMonitorsKeyword);
        self.parse_delimited_list(None, |p| p.parse_monitor(cycles_elapsed));
    }

    fn parse_end(&mut self) {
        if self.is_keyword(&self.current, "END") {
            self.advance();
            if !self.current.is_eof() {
                self.display_error(self.current, ErrorKind::SymbolAfterEnd, true, &[]);
            }
        } else {
            self.display_error(self.current, ErrorKind::NoEndKeyword, true, &[]);
        }
    }

    /// Parses the whole file and returns whether the resulting network
    /// is ready to simulate: no source errors were reported, and every
    /// device input ended up connected.
    pub fn parse_network(mut self) -> ParseOutcome {
        if self.current.is_eof() {
            self.display_error(self.current, ErrorKind::EmptyFile, true, &[]);
        } else {
            self.parse_device_list();
            self.parse_connection_list();
            self.parse_monitor_list();
            self.parse_end();
        }

        let network_ready = self.network.check_network(&self.devices);
        let success = self.error_count == 0 && network_ready;

        eprintln!("\n{} error(s) found during parsing.", self.error_count);

        ParseOutcome {
            success,
            error_count: self.error_count,
            names: self.names,
            devices: self.devices,
            network: self.network,
            monitors: self.monitors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseOutcome {
        let names = Names::new();
        let scanner = Scanner::from_text(source);
        Parser::new(names, scanner).parse_network()
    }

    #[test]
    fn empty_file_reports_one_error() {
        let outcome = parse("");
        assert!(!outcome.success);
        assert_eq!(outcome.error_count, 1);
    }

    #[test]
    fn minimal_valid_circuit_succeeds() {
        let outcome = parse(
            "DEVICES { sw = SWITCH(0); a = AND(2); } \
             CONNECTIONS { sw = a.I1; sw = a.I2; } \
             MONITORS { a; } END",
        );
        assert!(outcome.success, "expected success, got {} errors", outcome.error_count);
        assert!(outcome.network.check_network(&outcome.devices));
    }

    #[test]
    fn missing_semicolon_is_a_single_error() {
        let outcome = parse(
            "DEVICES { sw = SWITCH(0) a = AND(1); } \
             CONNECTIONS { sw = a.I1; } MONITORS { } END",
        );
        assert_eq!(outcome.error_count, 1);
    }

    #[test]
    fn misspelt_keyword_with_brace_present() {
        let outcome = parse("DEICES { } CONNECTIONS { } MONITORS { } END");
        assert!(outcome.error_count >= 1);
    }

    #[test]
    fn empty_device_list_is_an_error_but_empty_connections_and_monitors_are_not() {
        let outcome = parse("DEVICES { } CONNECTIONS { } MONITORS { } END");
        assert_eq!(outcome.error_count, 1);
        assert!(!outcome.success);
    }

    #[test]
    fn out_of_range_arity_reports_its_own_message_not_the_clock_one() {
        let outcome = parse(
            "DEVICES { a = AND(20); } \
             CONNECTIONS { } MONITORS { } END",
        );
        assert_eq!(outcome.error_count, 1);
    }
}
