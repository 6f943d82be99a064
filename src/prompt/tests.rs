use super::*;
use tempfile::TempDir;

fn strategies() -> BTreeMap<String, String> {
    [
        ("CoT", "  Think step by step.\n"),
        ("Blank", "   "),
    ]
    .into_iter()
    .map(|(name, text)| (name.to_string(), text.to_string()))
    .collect()
}

#[test]
fn minimal_prompt_with_content() {
    let prompt = PromptBuilder::default()
        .build(&PromptTemplate::with_instruction("answer"), "X")
        .expect("prompt should build");

    assert_eq!(
        prompt,
        "Instruction:\nanswer\n\nContent to process:\n<<<BEGIN CONTENT>>>\n```\nX\n```\n<<<END CONTENT>>>\n\nNow perform the task as instructed above."
    );
}

#[test]
fn full_template_section_order() {
    let template = PromptTemplate {
        goal: Some("  Explain ML terms.  ".to_string()),
        role: Some(" a patient tutor ".to_string()),
        instruction: Some("Answer the question.\n".to_string()),
        output_constraints: Some(vec!["Be factual.", "No speculation."].into()),
        style_or_tone: Some("Friendly.".into()),
        output_format: Some(vec!["Short paragraph."].into()),
        meta_instruction_for_debugging: Some("Explain your sources.".to_string()),
        reasoning_strategy: Some("CoT".to_string()),
    };

    let prompt = PromptBuilder::new(strategies())
        .build(&template, "  retrieved text \n")
        .expect("prompt should build");

    let expected = [
        "Goal:\nExplain ML terms.",
        "You are a patient tutor.",
        "Instruction:\nAnswer the question.",
        "Output constraints:\n- Be factual.\n- No speculation.",
        "Style and tone guidelines:\nFriendly.",
        "Response format:\n- Short paragraph.",
        "Debug instructions:\nExplain your sources.",
        "Content to process:\n<<<BEGIN CONTENT>>>\n```\nretrieved text\n```\n<<<END CONTENT>>>",
        "Think step by step.",
        "Now perform the task as instructed above.",
    ]
    .join("\n\n");
    assert_eq!(prompt, expected);
}

#[test]
fn missing_instruction_is_config_error() {
    let builder = PromptBuilder::default();

    let missing = PromptTemplate {
        goal: Some("A goal".to_string()),
        ..PromptTemplate::default()
    };
    assert!(matches!(
        builder.build(&missing, "X"),
        Err(RagError::Config(_))
    ));

    let blank = PromptTemplate::with_instruction("  \n ");
    assert!(matches!(
        builder.build(&blank, "X"),
        Err(RagError::Config(_))
    ));
}

#[test]
fn empty_context_adds_no_content_section() {
    let prompt = PromptBuilder::default()
        .build(&PromptTemplate::with_instruction("answer"), "")
        .expect("prompt should build");

    assert_eq!(
        prompt,
        "Instruction:\nanswer\n\nNow perform the task as instructed above."
    );
}

#[test]
fn notice_has_no_markers() {
    let prompt = PromptBuilder::default()
        .build_with(
            &PromptTemplate::with_instruction("answer"),
            PromptContent::Notice("Nothing relevant was found."),
        )
        .expect("prompt should build");

    assert_eq!(
        prompt,
        "Instruction:\nanswer\n\nNothing relevant was found.\n\nNow perform the task as instructed above."
    );
    assert!(!prompt.contains("<<<BEGIN CONTENT>>>"));
}

#[test]
fn unresolved_strategies_add_nothing() {
    let builder = PromptBuilder::new(strategies());
    let without = builder
        .build(&PromptTemplate::with_instruction("answer"), "X")
        .expect("prompt should build");

    for name in ["None", "Unknown", "Blank", ""] {
        let template = PromptTemplate {
            reasoning_strategy: Some(name.to_string()),
            ..PromptTemplate::with_instruction("answer")
        };
        let prompt = builder.build(&template, "X").expect("prompt should build");
        assert_eq!(prompt, without, "strategy {:?} should add nothing", name);
    }
}

#[test]
fn empty_optional_values_are_skipped() {
    let template = PromptTemplate {
        goal: Some(String::new()),
        role: Some("  ".to_string()),
        output_constraints: Some(PromptField::List(Vec::new())),
        style_or_tone: Some(PromptField::Text(String::new())),
        ..PromptTemplate::with_instruction("answer")
    };

    let prompt = PromptBuilder::default()
        .build(&template, "")
        .expect("prompt should build");
    assert_eq!(
        prompt,
        "Instruction:\nanswer\n\nNow perform the task as instructed above."
    );
}

#[test]
fn build_is_deterministic() {
    let builder = PromptBuilder::new(strategies());
    let library = PromptLibrary::builtin();
    let template = library
        .get("rag_wiki_assistant_prompt")
        .expect("built-in template should exist");

    assert_eq!(
        builder.build(template, "context").expect("prompt should build"),
        builder.build(template, "context").expect("prompt should build")
    );
}

#[test]
fn templates_parse_strings_and_lists() {
    let library = PromptLibrary::from_toml(
        r#"
[short]
instruction = "Summarise."
output_format = "One line."

[listed]
instruction = "Answer."
output_constraints = ["First.", "Second."]
reasoning_strategy = "None"
"#,
    )
    .expect("templates should parse");

    let short = library.get("short").expect("short template should exist");
    assert_eq!(short.output_format, Some(PromptField::Text("One line.".to_string())));

    let listed = library.get("listed").expect("listed template should exist");
    assert_eq!(
        listed.output_constraints,
        Some(PromptField::List(vec!["First.".to_string(), "Second.".to_string()]))
    );
    assert_eq!(library.names().collect::<Vec<_>>(), vec!["listed", "short"]);

    assert!(matches!(library.get("missing"), Err(RagError::NotFound(_))));
}

#[test]
fn builtin_templates_are_valid() {
    let library = PromptLibrary::builtin();
    let template = library
        .get("rag_wiki_assistant_prompt")
        .expect("built-in template should exist");

    assert!(template.instruction.is_some());
    assert_eq!(template.reasoning_strategy.as_deref(), Some("CoT"));
    assert_eq!(
        PromptLibrary::from_toml(PromptLibrary::builtin_toml()).expect("should parse"),
        library
    );
}

#[test]
fn load_from_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("prompts.toml");

    assert!(matches!(
        PromptLibrary::load(&path),
        Err(RagError::NotFound(_))
    ));
    assert_eq!(
        PromptLibrary::load_or_default(&path).expect("fallback should load"),
        PromptLibrary::builtin()
    );

    std::fs::write(&path, "[custom]\ninstruction = \"Do it.\"\n").expect("should write file");
    let library = PromptLibrary::load(&path).expect("file should load");
    assert!(library.get("custom").is_ok());
    assert!(library.get("rag_wiki_assistant_prompt").is_err());

    std::fs::write(&path, "[broken\n").expect("should write file");
    assert!(matches!(
        PromptLibrary::load(&path),
        Err(RagError::Config(_))
    ));
}
