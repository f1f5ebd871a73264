use colored::Colorize;

pub struct Theme {
    pub welcome_message: String,
    pub exit_message: String,
    pub prompt_style: Box<dyn Fn(String) -> String>,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub notice_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            welcome_message: "Welcome to nexsh - an AI-assisted Unix shell"
                .bright_cyan()
                .to_string(),
            exit_message: "Goodbye!".bright_cyan().to_string(),
            prompt_style: Box::new(|s| s.bright_green().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
            notice_style: Box::new(|s| s.bright_yellow().to_string()),
        }
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "plain" => Theme {
            welcome_message: String::from("Welcome to nexsh - an AI-assisted Unix shell"),
            exit_message: String::from("Goodbye!"),
            prompt_style: Box::new(|s| s),
            error_style: Box::new(|s| s),
            notice_style: Box::new(|s| s),
        },
        _ => Theme::default(),
    }
}
