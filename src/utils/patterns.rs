use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Regular,
}

/// One tagged predicate in the priority table. Rules are evaluated in
/// order, first match wins, so the High entries must stay ahead of the
/// Medium ones.
pub struct PriorityRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub priority: Priority,
}

fn rule(name: &'static str, pattern: &str, priority: Priority) -> PriorityRule {
    PriorityRule {
        name,
        pattern: Regex::new(pattern).unwrap(),
        priority,
    }
}

lazy_static! {
    pub static ref PRIORITY_RULES: Vec<PriorityRule> = vec![
        // Authentication, identity and secret handling.
        rule("authentication", r"auth", Priority::High),
        rule("login", r"login|signin|signup", Priority::High),
        rule("jwt", r"jwt", Priority::High),
        rule("token", r"token", Priority::High),
        rule("password", r"password", Priority::High),
        rule("session", r"session", Priority::High),
        rule("credential", r"credential", Priority::High),
        rule("oauth", r"oauth", Priority::High),
        rule("api-key", r"api[_-]?key", Priority::High),
        // Infrastructure and configuration surfaces.
        rule("middleware", r"middleware", Priority::Medium),
        rule("route", r"route", Priority::Medium),
        // Short keywords get loose word boundaries so "rapid.js" or
        // "feedback.py" stay regular.
        rule("api", r"(?:^|[/_.-])api(?:[/_.-]|$)", Priority::Medium),
        rule("security", r"security", Priority::Medium),
        rule("config", r"config", Priority::Medium),
        rule("env-file", r"(?:^|[/_.-])env(?:[/_.-]|$)", Priority::Medium),
        rule("database", r"database", Priority::Medium),
        rule("db", r"(?:^|[/_.-])db(?:[/_.-]|$)", Priority::Medium),
    ];
}

const EXCLUDED_SEGMENTS: &[&str] = &[
    "node_modules",
    "vendor",
    ".git",
    "dist",
    "build",
    "out",
    "target",
    ".next",
    "coverage",
    ".nyc_output",
    ".vscode",
    ".idea",
    "venv",
    ".venv",
    "__pycache__",
    "test",
    "tests",
    "__tests__",
    "spec",
];

const LOCKFILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "cargo.lock",
    "poetry.lock",
    "pipfile.lock",
    "composer.lock",
    "gemfile.lock",
];

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "mjs", "cjs", "py", "rb", "php", "go", "rs", "java", "kt", "swift",
    "c", "h", "cc", "cpp", "hpp", "cs", "scala", "sql", "sh",
];

/// Build artifacts, dependencies, version control, tests, lockfiles,
/// minified bundles and source maps never reach the model.
pub fn is_excluded_path(path: &str) -> bool {
    let lowered = path.to_lowercase();

    if lowered
        .split('/')
        .any(|segment| EXCLUDED_SEGMENTS.contains(&segment))
    {
        return true;
    }

    let file_name = lowered.rsplit('/').next().unwrap_or(&lowered);
    if LOCKFILES.contains(&file_name) {
        return true;
    }

    file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name.contains(".min.")
        || file_name.contains(".bundle.")
        || file_name.ends_with(".map")
}

pub fn has_supported_extension(path: &str) -> bool {
    match path.rsplit_once('.') {
        Some((_, extension)) => SUPPORTED_EXTENSIONS.contains(&extension.to_lowercase().as_str()),
        None => false,
    }
}

pub fn classify_priority(path: &str) -> Priority {
    let lowered = path.to_lowercase();
    for rule in PRIORITY_RULES.iter() {
        if rule.pattern.is_match(&lowered) {
            debug!("{} matched priority rule '{}'", path, rule.name);
            return rule.priority;
        }
    }
    Priority::Regular
}
