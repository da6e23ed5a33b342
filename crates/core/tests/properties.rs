use std::fs;

use regex::Regex;
use serde_json::json;
use tempfile::TempDir;

use turn_normalizer_core::ooc::correct_ooc_attribution;
use turn_normalizer_core::{
    process_file, LineOutcome, LineStatus, Normalizer, PipelineConfig, RawLine, RecordFixes, Role,
    Turn,
};

fn record(turns: &[(&str, &str)]) -> String {
    let conversations: Vec<_> = turns
        .iter()
        .map(|(from, value)| json!({"from": from, "value": value}))
        .collect();
    json!({"id": "rec", "conversations": conversations}).to_string()
}

fn turns(turns: &[(&str, &str)]) -> Vec<Turn> {
    turns
        .iter()
        .map(|(from, value)| match *from {
            "gpt" => Turn::narrator(*value),
            "human" => Turn::user(*value),
            other => Turn::new(Role::Raw(other.to_string()), *value),
        })
        .collect()
}

fn raw(index: usize, text: &str) -> RawLine {
    RawLine {
        index,
        bytes: format!("{text}\n").into_bytes(),
    }
}

fn fixes(outcome: &LineOutcome) -> RecordFixes {
    match &outcome.status {
        LineStatus::Normalized(fixes) => *fixes,
        LineStatus::PassedThrough { reason, .. } => panic!("passed through: {reason}"),
    }
}

/// Messy records covering every stage.
fn corpus() -> Vec<Vec<(&'static str, &'static str)>> {
    vec![
        // Merged user turn
        vec![("gpt", "Good work.\n\n{user}: What now?")],
        // Bare label left behind by a split
        vec![
            ("gpt", "The gate opens.\n\n{user}: Kael:"),
            ("gpt", "The guard nods."),
        ],
        // Swallowed OOC question and answer
        vec![
            ("gpt", "The hearth is warm."),
            ("human", "I sit by the fire."),
            (
                "gpt",
                "*The fire crackles.*\nooc: why did she lie?\n{narrator}:\nooc: she protects her brother.",
            ),
        ],
        // Interview block
        vec![
            ("gpt", "The hall falls silent."),
            ("human", "What are your motives, Kael?"),
            ("gpt", "Revenge, mostly."),
            ("human", "And Mira?"),
            ("human", "I draw my sword."),
        ],
        // OOC exchange opened by the narrator
        vec![
            ("gpt", "Rain falls on the camp."),
            ("human", "I wait."),
            ("gpt", "ooc: sure"),
            ("gpt", "ooc: go on"),
        ],
        // Reversed tag order
        vec![
            ("gpt", "The ship docks."),
            ("human", "ooc: can we skip the market?"),
            ("gpt", "ooc: {narrator}: ooc: yes, we skip it."),
        ],
        // Acknowledgement in a narrator turn
        vec![
            ("gpt", "You must not open the chest."),
            ("gpt", "Understood, I leave it."),
        ],
        // Junk turns
        vec![
            ("gpt", "The door creaks."),
            ("human", "ooc:"),
            ("human", "{user}:"),
            ("human", "I enter."),
        ],
        // Preamble
        vec![
            ("system", "You are the dungeon master."),
            ("gpt", "Welcome, traveler."),
            ("human", "Hello."),
        ],
        // Tagged narrator turn merged across a scrubbed label
        vec![
            ("gpt", "The gate opens.\n\n{user}: Kael:"),
            ("gpt", "{narrator}: The guard nods."),
        ],
        // Interview question in a narrator turn
        vec![
            ("gpt", "The hall is quiet."),
            ("gpt", "What are your motives, Kael?"),
            ("gpt", "Revenge."),
            ("gpt", "I see."),
        ],
        // OOC line leading narrative
        vec![
            ("gpt", "The road."),
            ("human", "I walk."),
            (
                "gpt",
                "ooc: Resuming scene.\n\n*The character walks into the tavern.*",
            ),
        ],
    ]
}

fn content_words(texts: impl IntoIterator<Item = String>) -> Vec<String> {
    let markers = Regex::new(r"(?i)\{narrator\}:|\{user\}:|ooc:").unwrap();
    let mut words: Vec<String> = texts
        .into_iter()
        .flat_map(|text| {
            markers
                .replace_all(&text, " ")
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    words.sort();
    words
}

#[test]
fn normalizing_twice_changes_nothing() {
    let normalizer = Normalizer::default();
    for (index, case) in corpus().iter().enumerate() {
        let first = normalizer.normalize_line(&raw(index + 1, &record(case)));
        let second = normalizer.normalize_line(&RawLine {
            index: index + 1,
            bytes: first.bytes.clone(),
        });
        assert_eq!(
            String::from_utf8_lossy(&second.bytes),
            String::from_utf8_lossy(&first.bytes),
            "record {index}"
        );
        assert_eq!(fixes(&second).total(), 0, "record {index}");

        // Not just cancelled out: every stage finds nothing left to do
        let (once, _) = normalizer.normalize(turns(case));
        let (twice, stage_fixes) = normalizer.normalize(once.clone());
        assert_eq!(twice, once, "record {index}");
        assert_eq!(stage_fixes.total(), 0, "record {index}: {stage_fixes:?}");
    }
}

#[test]
fn output_alternates_and_has_no_empty_turns() {
    let normalizer = Normalizer::default();
    for (index, case) in corpus().iter().enumerate() {
        let (out, _) = normalizer.normalize(turns(case));
        assert!(
            out.iter().all(|turn| !turn.text.trim().is_empty()),
            "record {index}"
        );
        for pair in out.windows(2) {
            assert!(
                !(pair[0].role == pair[1].role && pair[0].is_ooc() == pair[1].is_ooc()),
                "record {index}: {:?}",
                pair
            );
        }
    }
}

#[test]
fn content_is_only_regrouped() {
    let normalizer = Normalizer::default();
    for (index, case) in corpus().iter().enumerate() {
        let input = turns(case);
        let (out, _) = normalizer.normalize(input.clone());
        let before = content_words(input.into_iter().map(|t| t.text));
        let after = content_words(out.into_iter().map(|t| t.text));
        // A bare "Kael:" label is junk once split out
        let mut expected = before;
        expected.retain(|word| word != "Kael:");
        assert_eq!(after, expected, "record {index}");
    }
}

#[test]
fn scenario_bare_label_is_dropped() {
    let (out, fixes) = Normalizer::default().normalize(vec![Turn::narrator("Hello:\n")]);
    assert!(out.is_empty());
    assert_eq!(fixes.junk_removed, 1);
}

#[test]
fn scenario_merged_user_turn_is_split() {
    let (out, fixes) =
        Normalizer::default().normalize(vec![Turn::narrator("Good work.\n\n{user}: What now?")]);
    assert_eq!(out, vec![Turn::narrator("Good work."), Turn::user("What now?")]);
    assert_eq!(fixes.segments_split, 1);
}

#[test]
fn scenario_narrator_only_ooc_block_gets_user_opener() {
    let (out, fixes) = correct_ooc_attribution(vec![
        Turn::narrator("ooc: sure"),
        Turn::narrator("ooc: go on"),
    ]);
    assert_eq!(out, vec![Turn::user("ooc: sure"), Turn::narrator("ooc: go on")]);
    assert_eq!(fixes, 1);
}

#[test]
fn scenario_adjacent_narrative_turns_merge() {
    let (out, fixes) = Normalizer::default().normalize(vec![
        Turn::narrator("The gate opens.\n\n{user}: Kael:"),
        Turn::narrator("The guard nods."),
    ]);
    assert_eq!(
        out,
        vec![Turn::narrator("The gate opens.\n\nThe guard nods.")]
    );
    assert_eq!(fixes.merges, 1);
    assert_eq!(fixes.junk_removed, 1);
    assert_eq!(fixes.total(), 5);
}

#[test]
fn scenario_unparseable_line_is_copied_verbatim() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    let output = dir.path().join("out.jsonl");
    let clean = record(&[("gpt", "The road is quiet."), ("human", "I walk on.")]);

    let mut bytes = format!("{clean}\n{{\"conversations\": [\r\n").into_bytes();
    bytes.extend_from_slice(&[0xff, b'{', b'\n']);
    bytes.extend_from_slice(clean.as_bytes());
    fs::write(&input, &bytes).unwrap();

    let report = process_file(&input, &output, &PipelineConfig::default()).unwrap();
    assert_eq!(fs::read(&output).unwrap(), bytes);
    assert_eq!(report.records_read, 4);
    assert_eq!(report.warnings, 2);
    assert_eq!(report.records_fixed, 0);
    assert_eq!(report.total_fixes, 0);
}

#[test]
fn rewritten_records_keep_other_fields() {
    let line = json!({
        "id": 42,
        "conversations": [
            {"from": "system", "value": "Be the DM."},
            {"from": "gpt", "value": "Good work.\n\n{user}: What now?"},
        ],
        "source": "session-7",
    })
    .to_string();
    let outcome = Normalizer::default().normalize_line(&raw(1, &line));
    let value: serde_json::Value = serde_json::from_slice(&outcome.bytes).unwrap();
    assert_eq!(value["id"], 42);
    assert_eq!(value["source"], "session-7");
    assert_eq!(value["conversations"][0]["from"], "system");
    assert_eq!(value["conversations"][2]["from"], "human");
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["id", "conversations", "source"]);
}
