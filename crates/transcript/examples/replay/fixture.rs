use relay_interface::{
    ProtocolEvent, RawChunk, SenderRole, TurnStatus, WordToken, encode_event, encode_legacy_chunk,
};

#[derive(Clone, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Fixture {
    AgentWords,
    LegacySplit,
    MixedRelay,
}

impl Fixture {
    pub fn chunks(&self) -> Vec<RawChunk> {
        match self {
            Self::AgentWords => agent_words(),
            Self::LegacySplit => legacy_split(),
            Self::MixedRelay => mixed_relay(),
        }
    }
}

fn binary(sender: &str, event: &ProtocolEvent) -> RawChunk {
    RawChunk::new(sender, encode_event(event).expect("fixture event must encode"))
}

fn legacy(sender: &str, message_id: &str, part_index: u32, payload: &str) -> RawChunk {
    RawChunk::new(
        sender,
        encode_legacy_chunk(message_id, part_index, payload).into_bytes(),
    )
}

fn token(text: &str, start_ms: u64, end_ms: u64, is_final: bool) -> WordToken {
    WordToken {
        text: text.to_string(),
        is_final,
        start_ms,
        end_ms,
    }
}

fn fragment(
    turn_id: &str,
    sender_id: &str,
    role: SenderRole,
    seq: u64,
    words: Vec<WordToken>,
    is_final: bool,
) -> ProtocolEvent {
    ProtocolEvent::TranscriptionFragment {
        turn_id: turn_id.to_string(),
        sender_id: sender_id.to_string(),
        role,
        text: words.iter().map(|w| w.text.as_str()).collect(),
        words,
        is_final,
        sequence_id: Some(seq),
    }
}

/// Word-granularity conversation: incremental token commits, an explicit
/// end-of-turn update, and a barge-in interrupt that truncates mid-sentence.
fn agent_words() -> Vec<RawChunk> {
    vec![
        binary(
            "mara",
            &fragment(
                "t1",
                "mara",
                SenderRole::User,
                1,
                vec![
                    token("What's", 0, 380, true),
                    token(" the", 410, 520, true),
                    token(" weather", 550, 940, false),
                ],
                false,
            ),
        ),
        binary(
            "mara",
            &fragment(
                "t1",
                "mara",
                SenderRole::User,
                1,
                vec![
                    token(" weather", 550, 940, true),
                    token(" like", 990, 1200, true),
                    token(" tomorrow?", 1260, 1900, true),
                ],
                true,
            ),
        ),
        binary(
            "relay",
            &fragment(
                "t2",
                "assistant",
                SenderRole::Agent,
                2,
                vec![token("Tomorrow", 0, 420, true), token(" looks", 450, 700, false)],
                false,
            ),
        ),
        binary(
            "relay",
            &fragment(
                "t2",
                "assistant",
                SenderRole::Agent,
                2,
                vec![
                    token(" looks", 450, 700, true),
                    token(" clear,", 740, 1100, true),
                    token(" high", 1160, 1420, true),
                    token(" of", 1450, 1540, true),
                    token(" seventy.", 1580, 2200, true),
                ],
                false,
            ),
        ),
        binary(
            "relay",
            &turn_update("t2", 2, TurnStatus::End),
        ),
        binary(
            "relay",
            &fragment(
                "t3",
                "assistant",
                SenderRole::Agent,
                3,
                vec![
                    token("I", 0, 90, true),
                    token(" can", 120, 300, true),
                    token(" also", 340, 620, true),
                    token(" check", 660, 980, true),
                    token(" the", 1010, 1120, true),
                    token(" weekend", 1160, 1700, false),
                ],
                false,
            ),
        ),
        binary(
            "mara",
            &ProtocolEvent::InterruptSignal {
                turn_id: "t3".to_string(),
                at_offset_ms: Some(1000),
            },
        ),
        binary(
            "mara",
            &fragment(
                "t4",
                "mara",
                SenderRole::User,
                4,
                vec![
                    token("Just", 0, 300, true),
                    token(" the", 330, 440, true),
                    token(" weekend,", 480, 990, true),
                    token(" please.", 1030, 1500, true),
                ],
                true,
            ),
        ),
    ]
}

/// Legacy dialect only: monotonically growing block text, plus one payload
/// delivered split across three chunks and reassembled.
fn legacy_split() -> Vec<RawChunk> {
    let agent_json =
        r#"{"text":"Sure. You said you want the report by Thursday morning.","is_final":true,"user_id":""}"#;
    let (part_a, rest) = agent_json.split_at(30);
    let (part_b, part_c) = rest.split_at(34);

    vec![
        legacy("mara", "m1", 0, r#"{"text":"Could you","is_final":false}"#),
        legacy(
            "mara",
            "m1",
            1,
            r#"{"text":"Could you read that back","is_final":false}"#,
        ),
        legacy(
            "mara",
            "m1",
            2,
            r#"{"text":"Could you read that back to me?","is_final":true}"#,
        ),
        legacy("relay", "m2", 0, part_a),
        legacy("relay", "m2", 1, part_b),
        legacy("relay", "m2", 2, part_c),
    ]
}

/// Both dialects interleaved, with a duplicate delivery and a lost explicit
/// end recovered by the next turn's higher sequence id.
fn mixed_relay() -> Vec<RawChunk> {
    let dup = binary(
        "relay",
        &fragment(
            "t1",
            "assistant",
            SenderRole::Agent,
            10,
            vec![token("Give", 0, 200, true), token(" me", 230, 340, true), token(" a", 370, 420, true), token(" second.", 450, 900, false)],
            false,
        ),
    );

    vec![
        dup.clone(),
        dup,
        legacy("mara", "m1", 0, r#"{"text":"Take your time.","is_final":true}"#),
        binary(
            "relay",
            &fragment(
                "t2",
                "assistant",
                SenderRole::Agent,
                12,
                vec![token("Found", 0, 280, true), token(" it.", 310, 520, true)],
                true,
            ),
        ),
    ]
}

fn turn_update(turn_id: &str, seq: u64, status: TurnStatus) -> ProtocolEvent {
    ProtocolEvent::AgentTurnUpdate {
        turn_id: turn_id.to_string(),
        sequence_id: seq,
        status,
        quiet: false,
    }
}
