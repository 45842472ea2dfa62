//! Seed data: the AutoTexto table and the built-in report templates.

use crate::models::{
    DynamicField, FieldType, Modality, Scalar, Template, TemplateSection, TemplateType,
    TriggerDefinition,
};

const SEED_TRIGGERS: &[(&str, &str, &str, &str, &str)] = &[
    // (id, trigger, content, category, tag)
    ("normal", "/n", "normal", "common", "normal"),
    ("preserved", "/p", "preservado", "common", "normal"),
    ("bilateral", "/b", "bilateral", "common", "location"),
    ("symmetrical", "/s", "simétrico", "common", "description"),
    ("measures", "/m", "mede", "measurements", "measurement"),
    ("approximately", "/a", "aproximadamente", "measurements", "measurement"),
    ("right", "/d", "direito", "location", "location"),
    ("left", "/e", "esquerdo", "location", "location"),
    ("superior", "/sup", "superior", "location", "location"),
    ("inferior", "/inf", "inferior", "location", "location"),
    ("no-changes", "/nc", "Sem alterações significativas", "phrases", "normal"),
    ("compared-to", "/cp", "em comparação com exame anterior", "phrases", "comparison"),
    ("suggests", "/sg", "sugere", "phrases", "impression"),
    ("without", "/sem", "sem", "negatives", "negative"),
    ("no-evidence", "/ne", "sem evidências de", "negatives", "negative"),
    ("density", "/den", "densidade", "technical", "description"),
    ("signal", "/sig", "sinal", "technical", "description"),
    ("intensity", "/int", "intensidade", "technical", "description"),
];

/// The built-in AutoTexto triggers, in registry order
pub fn seed_triggers() -> Vec<TriggerDefinition> {
    SEED_TRIGGERS
        .iter()
        .map(|(id, trigger, content, category, tag)| TriggerDefinition {
            id: id.to_string(),
            trigger: trigger.to_string(),
            content: content.to_string(),
            category: category.to_string(),
            tags: vec![tag.to_string()],
            conditions: vec![],
        })
        .collect()
}

fn section(id: &str, title: &str, content: &str, fields: Vec<DynamicField>) -> TemplateSection {
    TemplateSection {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        is_optional: false,
        dynamic_fields: fields,
    }
}

fn optional(mut section: TemplateSection) -> TemplateSection {
    section.is_optional = true;
    section
}

fn select(id: &str, name: &str, options: &[&str], default: &str) -> DynamicField {
    DynamicField {
        id: id.to_string(),
        name: name.to_string(),
        field_type: FieldType::Select,
        options: options.iter().map(|o| o.to_string()).collect(),
        default_value: Some(Scalar::Text(default.to_string())),
        unit: None,
    }
}

fn template(
    id: &str,
    name: &str,
    description: &str,
    modality: Modality,
    body_part: &str,
    template_type: TemplateType,
    tags: &[&str],
    sections: Vec<TemplateSection>,
) -> Template {
    Template {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        modality,
        body_part: body_part.to_string(),
        template_type,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        sections,
        shortcut: None,
        is_custom: false,
        created_at: None,
        updated_at: None,
    }
}

/// The built-in report templates. These are never modified or persisted.
pub fn builtin_templates() -> Vec<Template> {
    vec![
        template(
            "ct-chest-normal",
            "CT Tórax Normal",
            "Template padrão para TC de tórax normal",
            Modality::Ct,
            "Chest",
            TemplateType::Normal,
            &["tórax", "normal", "rotina"],
            vec![
                section(
                    "technique",
                    "Técnica",
                    "Realizadas aquisições volumétricas do tórax, {Contraste}.",
                    vec![select(
                        "contrast",
                        "Contraste",
                        &[
                            "sem administração endovenosa de contraste iodado",
                            "após administração endovenosa de contraste iodado",
                        ],
                        "sem administração endovenosa de contraste iodado",
                    )],
                ),
                section(
                    "lungs",
                    "Pulmões e vias aéreas",
                    "Pulmões expandidos, com atenuação preservada.\nVias aéreas pérvias, de calibre normal.\nAusência de nódulos ou massas pulmonares.\nNão há derrame pleural.",
                    vec![DynamicField {
                        id: "has-nodules".to_string(),
                        name: "Nódulos".to_string(),
                        field_type: FieldType::Boolean,
                        options: vec![],
                        default_value: Some(Scalar::Bool(false)),
                        unit: None,
                    }],
                ),
                section(
                    "mediastinum",
                    "Mediastino",
                    "Estruturas mediastinais com aspecto anatômico.\nÁrea cardíaca com dimensões normais.\nAusência de linfonodomegalias.",
                    vec![],
                ),
                section(
                    "pleura",
                    "Pleura e parede torácica",
                    "Superfícies pleurais regulares.\nEstruturas ósseas e partes moles da parede torácica sem alterações.",
                    vec![],
                ),
                optional(section(
                    "comparison",
                    "Comparação",
                    "Em comparação com exame de {Data do exame anterior}, sem alterações significativas.",
                    vec![DynamicField {
                        id: "prior-exam-date".to_string(),
                        name: "Data do exame anterior".to_string(),
                        field_type: FieldType::Text,
                        options: vec![],
                        default_value: None,
                        unit: None,
                    }],
                )),
                section(
                    "impression",
                    "Impressão",
                    "Tomografia computadorizada do tórax sem alterações significativas.",
                    vec![],
                ),
            ],
        ),
        template(
            "ct-chest-covid",
            "CT Tórax - COVID-19",
            "Template para achados típicos de COVID-19",
            Modality::Ct,
            "Chest",
            TemplateType::Findings,
            &["tórax", "covid", "infecção"],
            vec![
                section(
                    "technique",
                    "Técnica",
                    "Realizadas aquisições volumétricas do tórax, sem administração endovenosa de contraste iodado.",
                    vec![],
                ),
                section(
                    "findings",
                    "Achados",
                    "Opacidades em vidro fosco de distribuição periférica e predominantemente posterior, acometendo {Envolvimento} do parênquima pulmonar.\nPadrão tomográfico: {Padrão}.",
                    vec![
                        select(
                            "involvement",
                            "Envolvimento",
                            &["< 10%", "10-25%", "25-50%", "50-75%", "> 75%"],
                            "10-25%",
                        ),
                        select(
                            "pattern",
                            "Padrão",
                            &["Típico", "Indeterminado", "Atípico"],
                            "Típico",
                        ),
                    ],
                ),
                section(
                    "conclusion",
                    "Conclusão",
                    "Achados tomográficos típicos de pneumonia viral, podendo corresponder a infecção pelo SARS-CoV-2, considerando o contexto epidemiológico atual.",
                    vec![],
                ),
            ],
        ),
        template(
            "mri-brain-normal",
            "RM Crânio Normal",
            "Template padrão para RM de crânio normal",
            Modality::Mri,
            "Brain",
            TemplateType::Normal,
            &["neurologia", "crânio", "normal"],
            vec![
                section(
                    "technique",
                    "Técnica",
                    "Realizadas sequências multiplanares ponderadas em T1, T2, FLAIR, DWI e SWI, sem administração endovenosa de contraste paramagnético.",
                    vec![],
                ),
                section(
                    "parenchyma",
                    "Parênquima encefálico",
                    "Parênquima encefálico com morfologia, sinal e distribuição da substância branca e cinzenta preservados.\nSistema ventricular com morfologia e dimensões {Ventrículos}.\nNão há efeito de massa ou desvio da linha média.",
                    vec![select(
                        "ventricles",
                        "Ventrículos",
                        &["normais", "aumentadas", "reduzidas"],
                        "normais",
                    )],
                ),
                section(
                    "extra-axial",
                    "Espaços extra-axiais",
                    "Espaços extra-axiais com amplitude normal.\nCisternas da base pérvias.",
                    vec![],
                ),
                section(
                    "vascular",
                    "Estruturas vasculares",
                    "Artérias do polígono de Willis com morfologia e sinal de fluxo habituais.\nSeios venosos pérvios.",
                    vec![],
                ),
            ],
        ),
        template(
            "xr-chest-normal",
            "RX Tórax Normal",
            "Template padrão para radiografia de tórax normal",
            Modality::Xr,
            "Chest",
            TemplateType::Normal,
            &["tórax", "raio-x", "normal"],
            vec![
                section(
                    "technique",
                    "Técnica",
                    "Radiografia de tórax em incidências PA e perfil.",
                    vec![],
                ),
                section(
                    "findings",
                    "Achados",
                    "Campos pulmonares com transparência normal.\nSeios costofrênicos livres.\nÍndice cardiotorácico de {ICT}, dentro dos limites da normalidade.\nHilos pulmonares com aspecto habitual.\nMediastino centrado.\nEstruturas ósseas sem alterações.",
                    vec![DynamicField {
                        id: "cardio-thoracic-index".to_string(),
                        name: "ICT".to_string(),
                        field_type: FieldType::Measurement,
                        options: vec![],
                        default_value: Some(Scalar::Number(50.0)),
                        unit: Some("%".to_string()),
                    }],
                ),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_seed_trigger_strings_are_unique() {
        let triggers = seed_triggers();
        let unique: HashSet<String> = triggers.iter().map(|t| t.trigger.to_lowercase()).collect();
        assert_eq!(unique.len(), triggers.len());
        assert!(triggers.iter().all(|t| t.trigger.starts_with('/')));
    }

    #[test]
    fn test_builtin_templates_have_sections_and_unique_ids() {
        let templates = builtin_templates();
        let ids: HashSet<&str> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), templates.len());
        assert!(templates.iter().all(|t| !t.sections.is_empty()));
    }
}
