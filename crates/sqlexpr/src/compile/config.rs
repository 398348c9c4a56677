/// How placeholders appear in compiled SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` (MySQL, SQLite, SQL Server drivers).
    #[default]
    Question,
    /// `$1, $2, ...` (Postgres wire protocol).
    Numbered,
}

/// Configuration for query compilation.
///
/// By default placeholder counts are verified against the collected bindings and
/// SQL is emitted with `?` placeholders.
#[derive(Debug, Clone)]
pub struct CompileConfig {
    /// Fail when the rendered SQL and the bindings disagree.
    pub verify_placeholders: bool,
    /// Placeholder style of the emitted SQL.
    pub placeholder_style: PlaceholderStyle,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            verify_placeholders: true,
            placeholder_style: PlaceholderStyle::Question,
        }
    }
}

impl CompileConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the placeholder count check.
    ///
    /// Needed when raw fragments use a literal `?` operator (e.g. Postgres `jsonb ? key`).
    pub fn skip_placeholder_check(mut self) -> Self {
        self.verify_placeholders = false;
        self
    }

    /// Enable the placeholder count check.
    pub fn verify_placeholders(mut self) -> Self {
        self.verify_placeholders = true;
        self
    }

    /// Set the placeholder style.
    pub fn with_placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder_style = style;
        self
    }

    /// Emit `$n` placeholders.
    pub fn numbered(self) -> Self {
        self.with_placeholder_style(PlaceholderStyle::Numbered)
    }
}
