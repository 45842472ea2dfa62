use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use radtext_core::templates::SortKey;
use radtext_core::{Modality, TemplateType};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    about = "radtext - radiology report editor with AutoTexto triggers and templates",
    long_about = "radtext expands AutoTexto triggers such as /n as you type and fills structured report templates.\n\n\
The assistant (Ctrl+G in the editor) runs the shell command in RADTEXT_GENERATOR with the report on stdin \
and the action in RADTEXT_ACTION. Without it the assistant answers with a fallback message."
)]
pub struct Radtext {
    #[clap(subcommand)]
    pub commands: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the report editor (default)
    Edit {
        #[clap(long, short, help = "Report file to open and save")]
        file: Option<PathBuf>,

        #[clap(long, help = "Drop the space or newline that fires a trigger")]
        consume_separator: bool,
    },
    /// Manage AutoTexto triggers
    #[clap(subcommand)]
    Trigger(TriggerCommands),
    /// Browse and manage report templates
    #[clap(subcommand)]
    Template(TemplateCommands),
    /// Expand the triggers in TEXT as if it were typed, and print the result
    Expand {
        text: String,

        #[clap(long, help = "Drop the space or newline that fires a trigger")]
        consume_separator: bool,
    },
    /// Record and review measurements
    #[clap(subcommand)]
    Measurement(MeasurementCommands),
    /// Start the API server for browser front-ends
    Serve {
        #[clap(long, short, default_value = "3000", help = "Port to listen on")]
        port: u16,
    },
}

#[derive(Subcommand)]
pub enum TriggerCommands {
    /// Add a new trigger
    Add {
        #[clap(long, short = 't', help = "Trigger token, e.g. /hep")]
        trigger: String,

        #[clap(long, short = 'c', help = "Text the trigger expands to")]
        content: String,

        #[clap(long, default_value = "custom", help = "Category shown in the trigger list")]
        category: String,
    },
    /// Update an existing trigger by id
    Update {
        #[clap(long, help = "Id of the trigger to update")]
        id: String,

        #[clap(long, short = 't', help = "New trigger token")]
        trigger: String,

        #[clap(long, short = 'c', help = "New expansion text")]
        content: String,

        #[clap(long, default_value = "custom")]
        category: String,
    },
    /// Delete a trigger by id
    Delete {
        #[clap(long, help = "Id of the trigger to delete")]
        id: String,
    },
    /// List all triggers by category
    List {
        #[clap(long, help = "One 'trigger - content' line per trigger")]
        plain: bool,
    },
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List all templates
    List {
        #[clap(long, short, help = "Sort by name, modality, body-part or type")]
        sort: Option<SortKey>,

        #[clap(long, requires = "sort", help = "Reverse the sort order")]
        desc: bool,

        #[clap(long, short, value_enum, help = "Group the listing")]
        group: Option<TemplateGrouping>,
    },
    /// Search templates by text and filters
    Search {
        #[clap(default_value = "")]
        query: String,

        #[clap(long, short)]
        modality: Option<Modality>,

        #[clap(long, short)]
        body_part: Option<String>,

        #[clap(long = "type")]
        template_type: Option<TemplateType>,
    },
    /// Show a template, or its rendered report with --render
    Show {
        id: String,

        #[clap(long, short, help = "Print the report rendered with stored values")]
        render: bool,
    },
    /// Export a template as JSON
    Export {
        id: String,

        #[clap(long, short, help = "Write to this file instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Import a template from a JSON file
    Import { path: PathBuf },
    /// Delete a user template
    Delete { id: String },
    /// Replace a user template with the one in a JSON file
    Update { id: String, path: PathBuf },
    /// Copy a template into a new user template
    Clone { id: String },
    /// Create a user template from FIRST followed by the sections of SECOND
    Merge {
        first: String,
        second: String,

        #[clap(long, short, help = "Name of the merged template")]
        name: Option<String>,
    },
    /// Show the sections and fields of a template with their current values
    Fields { id: String },
    /// Store a value for one field of a template
    SetField {
        id: String,
        field: String,
        value: String,
    },
    /// Turn an optional section on, or off with --disable
    EnableSection {
        id: String,
        section: String,

        #[clap(long)]
        disable: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TemplateGrouping {
    Modality,
    BodyPart,
}

#[derive(Subcommand)]
pub enum MeasurementCommands {
    /// Record a measurement
    Add {
        #[clap(long, short)]
        name: String,

        #[clap(long, short, allow_negative_numbers = true)]
        value: f64,

        #[clap(long, short, default_value = "mm")]
        unit: String,

        #[clap(long, short, help = "Date as YYYY-MM-DD, defaults to today")]
        date: Option<NaiveDate>,
    },
    /// List measurements grouped by name
    List,
    /// Delete a measurement by id
    Delete {
        #[clap(long)]
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Radtext::command().debug_assert();
    }

    #[test]
    fn test_parses_expand() {
        let args = Radtext::parse_from(["radtext", "expand", "Exame /n ", "--consume-separator"]);
        match args.commands {
            Some(Commands::Expand { text, consume_separator }) => {
                assert_eq!(text, "Exame /n ");
                assert!(consume_separator);
            }
            _ => panic!("expected expand"),
        }
    }

    #[test]
    fn test_parses_typed_template_filters() {
        let args = Radtext::parse_from(["radtext", "template", "search", "tórax", "-m", "ct", "--type", "findings"]);
        match args.commands {
            Some(Commands::Template(TemplateCommands::Search { query, modality, template_type, .. })) => {
                assert_eq!(query, "tórax");
                assert_eq!(modality, Some(Modality::Ct));
                assert_eq!(template_type, Some(TemplateType::Findings));
            }
            _ => panic!("expected template search"),
        }
        assert!(Radtext::try_parse_from(["radtext", "template", "search", "-m", "pet"]).is_err());
    }

    #[test]
    fn test_parses_field_editing() {
        let args = Radtext::parse_from([
            "radtext",
            "template",
            "set-field",
            "ct-chest-normal",
            "prior-exam-date",
            "12/03/2024",
        ]);
        assert!(matches!(
            args.commands,
            Some(Commands::Template(TemplateCommands::SetField { ref field, .. })) if field == "prior-exam-date"
        ));

        let args = Radtext::parse_from(["radtext", "template", "enable-section", "ct-chest-normal", "comparison", "--disable"]);
        assert!(matches!(
            args.commands,
            Some(Commands::Template(TemplateCommands::EnableSection { disable: true, .. }))
        ));
    }

    #[test]
    fn test_parses_sorted_listing() {
        let args = Radtext::parse_from(["radtext", "template", "list", "--sort", "body-part", "--desc", "-g", "modality"]);
        match args.commands {
            Some(Commands::Template(TemplateCommands::List { sort, desc, group })) => {
                assert_eq!(sort, Some(SortKey::BodyPart));
                assert!(desc);
                assert_eq!(group, Some(TemplateGrouping::Modality));
            }
            _ => panic!("expected template list"),
        }
        assert!(Radtext::try_parse_from(["radtext", "template", "list", "--desc"]).is_err());
    }

    #[test]
    fn test_no_subcommand_opens_editor() {
        assert!(Radtext::parse_from(["radtext"]).commands.is_none());
    }
}
