use crate::cli::{Commands, MeasurementCommands, TemplateCommands, TriggerCommands};
use crate::format::{field_listing, measurement_listing, template_listing, trigger_listing};
use crate::logging;
use chrono::Local;
use radtext_core::templates::{
    clone_template, export_template, import_template, merge_templates, sort_templates, SortOrder,
};
use radtext_core::{
    CommandGenerator, EditorConfig, EditorSession, JsonFileStore, KeyValueStore,
    OfflineGenerator, RadtextError, Result, Scalar, SeparatorPolicy, Template, TemplateFilter,
    TextGenerator, TriggerInput,
};
use std::fs;
use std::sync::{Arc, Mutex};

pub fn handle_command(command: Option<Commands>) -> Result<()> {
    match command {
        Some(Commands::Edit {
            file,
            consume_separator,
        }) => {
            logging::init(false);
            let mut session = open_session(consume_separator)?;
            radtext_ui::run_editor(&mut session, configured_generator().as_ref(), file)
        }
        Some(Commands::Serve { port }) => {
            logging::init(true);
            handle_serve_command(port)
        }
        Some(command) => {
            logging::init(true);
            handle_subcommand(command)
        }
        None => {
            logging::init(false);
            let mut session = open_session(false)?;
            radtext_ui::run_editor(&mut session, configured_generator().as_ref(), None)
        }
    }
}

/// The `RADTEXT_GENERATOR` command when set, else the offline fallback
fn configured_generator() -> Box<dyn TextGenerator> {
    match CommandGenerator::from_env() {
        Some(generator) => {
            tracing::info!("Using text generation command '{}'", generator.command());
            Box::new(generator)
        }
        None => Box::new(OfflineGenerator),
    }
}

fn open_session(consume_separator: bool) -> Result<EditorSession<JsonFileStore>> {
    let policy = if consume_separator {
        SeparatorPolicy::Consume
    } else {
        SeparatorPolicy::Reinsert
    };
    let store = JsonFileStore::open_default()?;
    Ok(EditorSession::load(
        store,
        EditorConfig::with_separator_policy(policy),
    ))
}

fn handle_subcommand(command: Commands) -> Result<()> {
    match command {
        Commands::Trigger(command) => {
            let mut session = open_session(false)?;
            handle_trigger_command(&mut session, command)
        }
        Commands::Template(command) => {
            let mut session = open_session(false)?;
            handle_template_command(&mut session, command)
        }
        Commands::Measurement(command) => {
            let mut session = open_session(false)?;
            handle_measurement_command(&mut session, command)
        }
        Commands::Expand {
            text,
            consume_separator,
        } => {
            let mut session = open_session(consume_separator)?;
            println!("{}", expand_text(&mut session, &text));
            Ok(())
        }
        Commands::Edit { .. } | Commands::Serve { .. } => Ok(()),
    }
}

/// Feed `text` through the live matcher into an empty document and return the result
pub fn expand_text<S: KeyValueStore>(session: &mut EditorSession<S>, text: &str) -> String {
    session.set_text("", 0);
    let expansions = session.type_text(text);
    tracing::debug!("Expanded {} trigger(s)", expansions.len());
    session.text().to_string()
}

pub fn handle_trigger_command<S: KeyValueStore>(
    session: &mut EditorSession<S>,
    command: TriggerCommands,
) -> Result<()> {
    match command {
        TriggerCommands::Add {
            trigger,
            content,
            category,
        } => session
            .add_trigger(TriggerInput::new(trigger, content).with_category(category))
            .map(|added| println!("Trigger {} added successfully [{}]", added.trigger, added.id)),
        TriggerCommands::Update {
            id,
            trigger,
            content,
            category,
        } => session
            .update_trigger(
                &id,
                TriggerInput::new(trigger, content).with_category(category),
            )
            .map(|updated| println!("Trigger {} updated successfully", updated.trigger)),
        TriggerCommands::Delete { id } => session
            .delete_trigger(&id)
            .map(|deleted| println!("Trigger {} deleted successfully", deleted.trigger)),
        TriggerCommands::List { plain } => {
            if session.registry().is_empty() {
                println!("No triggers defined.");
            } else if plain {
                println!("{}", session.registry().reference_listing());
            } else {
                print!("{}", trigger_listing(session.registry()));
            }
            Ok(())
        }
    }
}

pub fn handle_template_command<S: KeyValueStore>(
    session: &mut EditorSession<S>,
    command: TemplateCommands,
) -> Result<()> {
    match command {
        TemplateCommands::List { sort, desc, group } => {
            let mut templates = session.templates().list();
            if let Some(key) = sort {
                let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
                templates = sort_templates(&templates, key, order);
            }
            print!(
                "{}",
                template_listing(&templates, session.templates().favorite_ids(), group)
            );
            Ok(())
        }
        TemplateCommands::Search {
            query,
            modality,
            body_part,
            template_type,
        } => {
            let filter = TemplateFilter {
                modality,
                body_part,
                template_type,
                tags: Vec::new(),
            };
            let results = session.templates().search(&query, &filter);
            if results.is_empty() {
                println!("No templates match.");
            } else {
                print!(
                    "{}",
                    template_listing(&results, session.templates().favorite_ids(), None)
                );
            }
            Ok(())
        }
        TemplateCommands::Show { id, render } => {
            let template = find_template(session, &id)?;
            if render {
                let values = session.select_template(&id)?;
                println!("{}", session.render_template(&id, &values)?);
            } else {
                println!("{}", export_template(template)?);
            }
            Ok(())
        }
        TemplateCommands::Export { id, output } => {
            let template = find_template(session, &id)?;
            let json = export_template(template)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    println!("Template {} exported to {}", id, path.display());
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        TemplateCommands::Import { path } => {
            let template = import_template(&fs::read_to_string(&path)?)?;
            session
                .create_template(template)
                .map(|created| println!("Template {} imported successfully [{}]", created.name, created.id))
        }
        TemplateCommands::Delete { id } => session
            .delete_template(&id)
            .map(|deleted| println!("Template {} deleted successfully", deleted.name)),
        TemplateCommands::Update { id, path } => {
            let template = import_template(&fs::read_to_string(&path)?)?;
            session
                .update_template(&id, template)
                .map(|updated| println!("Template {} updated successfully", updated.name))
        }
        TemplateCommands::Clone { id } => {
            let copy = clone_template(find_template(session, &id)?);
            session
                .create_template(copy)
                .map(|created| println!("Template {} created successfully [{}]", created.name, created.id))
        }
        TemplateCommands::Merge {
            first,
            second,
            name,
        } => {
            let merged = {
                let first = find_template(session, &first)?;
                let second = find_template(session, &second)?;
                let mut merged = merge_templates(first, second);
                merged.name = name.unwrap_or_else(|| format!("{} + {}", first.name, second.name));
                merged
            };
            session
                .create_template(merged)
                .map(|created| println!("Template {} created successfully [{}]", created.name, created.id))
        }
        TemplateCommands::Fields { id } => {
            let values = session.select_template(&id)?;
            print!("{}", field_listing(find_template(session, &id)?, &values));
            Ok(())
        }
        TemplateCommands::SetField { id, field, value } => session
            .set_field_scalar(&id, &field, &Scalar::Text(value))
            .map(|_| println!("Field {} of {} set successfully", field, id)),
        TemplateCommands::EnableSection {
            id,
            section,
            disable,
        } => session
            .set_section_enabled(&id, &section, !disable)
            .map(|_| {
                let state = if disable { "disabled" } else { "enabled" };
                println!("Section {} of {} {}", section, id, state)
            }),
    }
}

pub fn handle_measurement_command<S: KeyValueStore>(
    session: &mut EditorSession<S>,
    command: MeasurementCommands,
) -> Result<()> {
    match command {
        MeasurementCommands::Add {
            name,
            value,
            unit,
            date,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            session
                .add_measurement(&name, value, &unit, date)
                .map(|added| println!("Measurement recorded: {} [{}]", added, added.id))
        }
        MeasurementCommands::List => {
            if session.measurements().is_empty() {
                println!("No measurements recorded.");
            } else {
                print!("{}", measurement_listing(session.measurements()));
            }
            Ok(())
        }
        MeasurementCommands::Delete { id } => session
            .delete_measurement(&id)
            .map(|deleted| println!("Measurement {} deleted successfully", deleted.name)),
    }
}

fn handle_serve_command(port: u16) -> Result<()> {
    let session = Arc::new(Mutex::new(open_session(false)?));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(radtext_server::start_api_server(port, session))
}

fn find_template<'a, S: KeyValueStore>(
    session: &'a EditorSession<S>,
    id: &str,
) -> Result<&'a Template> {
    session
        .templates()
        .get(id)
        .ok_or_else(|| RadtextError::TemplateNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use radtext_core::MemoryStore;

    #[test]
    fn test_expand_text_uses_session_registry() {
        let mut session = EditorSession::new(MemoryStore::new());
        assert_eq!(expand_text(&mut session, "Exame sem /n "), "Exame sem normal ");
        assert_eq!(expand_text(&mut session, "/nonexistent "), "/nonexistent ");
    }

    #[test]
    fn test_expand_text_consumes_separator() {
        let config = EditorConfig::with_separator_policy(SeparatorPolicy::Consume);
        let mut session = EditorSession::load(MemoryStore::new(), config);
        assert_eq!(expand_text(&mut session, "Rim /e "), "Rim esquerdo");
    }

    #[test]
    fn test_trigger_commands_persist() {
        let mut session = EditorSession::new(MemoryStore::new());
        handle_trigger_command(
            &mut session,
            TriggerCommands::Add {
                trigger: "/hep".to_string(),
                content: "hepatomegalia".to_string(),
                category: "phrases".to_string(),
            },
        )
        .unwrap();

        let duplicate = handle_trigger_command(
            &mut session,
            TriggerCommands::Add {
                trigger: "/HEP".to_string(),
                content: "x".to_string(),
                category: "custom".to_string(),
            },
        );
        assert!(matches!(duplicate, Err(RadtextError::DuplicateTrigger(_))));

        let reloaded = EditorSession::new(session.store().clone());
        assert!(reloaded.registry().find_trigger("/hep").is_some());
    }

    #[test]
    fn test_template_import_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        let mut session = EditorSession::new(MemoryStore::new());

        let mut template = session.templates().get("ct-chest-normal").unwrap().clone();
        template.id = "custom-chest".to_string();
        template.name = "Tórax personalizado".to_string();
        fs::write(&path, export_template(&template).unwrap()).unwrap();

        handle_template_command(&mut session, TemplateCommands::Import { path }).unwrap();
        let imported = session
            .templates()
            .user_templates()
            .iter()
            .find(|t| t.name == "Tórax personalizado")
            .unwrap()
            .id
            .clone();

        handle_template_command(&mut session, TemplateCommands::Delete { id: imported.clone() })
            .unwrap();
        assert!(session.templates().get(&imported).is_none());

        let builtin = handle_template_command(
            &mut session,
            TemplateCommands::Delete {
                id: "ct-chest-normal".to_string(),
            },
        );
        assert!(matches!(builtin, Err(RadtextError::BuiltinTemplate(_))));
    }

    #[test]
    fn test_field_commands_change_rendered_report() {
        let mut session = EditorSession::new(MemoryStore::new());
        handle_template_command(
            &mut session,
            TemplateCommands::EnableSection {
                id: "ct-chest-normal".to_string(),
                section: "comparison".to_string(),
                disable: false,
            },
        )
        .unwrap();
        handle_template_command(
            &mut session,
            TemplateCommands::SetField {
                id: "ct-chest-normal".to_string(),
                field: "prior-exam-date".to_string(),
                value: "12/03/2024".to_string(),
            },
        )
        .unwrap();

        let reopened = EditorSession::new(session.store().clone());
        let values = reopened.select_template("ct-chest-normal").unwrap();
        let report = reopened.render_template("ct-chest-normal", &values).unwrap();
        assert!(report.contains("Comparação:\nEm comparação com exame de 12/03/2024,"));

        let invalid = handle_template_command(
            &mut session,
            TemplateCommands::SetField {
                id: "xr-chest-normal".to_string(),
                field: "cardio-thoracic-index".to_string(),
                value: "largo".to_string(),
            },
        );
        assert!(invalid.is_err());
    }

    #[test]
    fn test_clone_and_merge_create_user_templates() {
        let mut session = EditorSession::new(MemoryStore::new());
        handle_template_command(
            &mut session,
            TemplateCommands::Clone {
                id: "ct-chest-normal".to_string(),
            },
        )
        .unwrap();
        handle_template_command(
            &mut session,
            TemplateCommands::Merge {
                first: "ct-chest-normal".to_string(),
                second: "ct-chest-covid".to_string(),
                name: None,
            },
        )
        .unwrap();

        let names: Vec<&str> = session
            .templates()
            .user_templates()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["CT Tórax Normal (Copy)", "CT Tórax Normal + CT Tórax - COVID-19"]);

        let missing = handle_template_command(
            &mut session,
            TemplateCommands::Clone {
                id: "missing".to_string(),
            },
        );
        assert!(matches!(missing, Err(RadtextError::TemplateNotFound(_))));
    }

    #[test]
    fn test_measurement_commands() {
        let mut session = EditorSession::new(MemoryStore::new());
        handle_measurement_command(
            &mut session,
            MeasurementCommands::Add {
                name: "Nódulo".to_string(),
                value: 8.0,
                unit: "mm".to_string(),
                date: None,
            },
        )
        .unwrap();
        assert_eq!(session.measurements().len(), 1);

        let missing = handle_measurement_command(
            &mut session,
            MeasurementCommands::Delete {
                id: "missing".to_string(),
            },
        );
        assert!(matches!(missing, Err(RadtextError::MeasurementNotFound(_))));
    }
}
