use shopfloor_store::{parse_payload, tokenize, ResetTrigger, Token};

fn upsert(key: &str, value: &str) -> Token {
    Token::Upsert {
        key: key.into(),
        value: value.into(),
    }
}

fn remove(key: &str) -> Token {
    Token::Remove { key: key.into() }
}

#[test]
fn splits_upserts_and_bare_keys() {
    let tokens = tokenize("a=1 b=2  c   d=4");
    assert_eq!(
        tokens,
        vec![upsert("a", "1"), upsert("b", "2"), remove("c"), upsert("d", "4")]
    );
}

#[test]
fn quoted_values_keep_whitespace() {
    let tokens = tokenize("a='1 2 3' b=\"x y\" c={chickens and horses} d=plain");
    assert_eq!(
        tokens,
        vec![
            upsert("a", "1 2 3"),
            upsert("b", "x y"),
            upsert("c", "chickens and horses"),
            upsert("d", "plain"),
        ]
    );
}

#[test]
fn quotes_do_not_nest_or_escape() {
    let tokens = tokenize("a='it\"s' b={x{y} c=\"q'\"");
    assert_eq!(
        tokens,
        vec![upsert("a", "it\"s"), upsert("b", "x{y"), upsert("c", "q'")]
    );
}

#[test]
fn unterminated_quote_drops_the_rest_of_the_payload() {
    let tokens = tokenize("a=1 c={chickens and horses d=4");
    assert_eq!(tokens, vec![upsert("a", "1")]);

    let tokens = tokenize("a='open");
    assert!(tokens.is_empty());
}

#[test]
fn empty_value_is_an_upsert_and_empty_key_is_ignored() {
    assert_eq!(tokenize("a="), vec![upsert("a", "")]);
    assert_eq!(tokenize("=5 b=1"), vec![upsert("b", "1")]);
}

#[test]
fn reset_tokens_are_recognised_anywhere() {
    let tokens = tokenize("a=1 :DAY b=2");
    assert_eq!(
        tokens,
        vec![upsert("a", "1"), Token::Reset(ResetTrigger::Day), upsert("b", "2")]
    );
    assert_eq!(tokenize(":"), vec![remove(":")]);
    assert_eq!(
        tokenize(":CUSTOM_THING"),
        vec![Token::Reset(ResetTrigger::Other("CUSTOM_THING".into()))]
    );
}

#[test]
fn garbage_degrades_to_bare_keys() {
    assert_eq!(tokenize("garbage"), vec![remove("garbage")]);
    assert!(tokenize("   ").is_empty());
    assert!(tokenize("").is_empty());
}

#[test]
fn parse_payload_hoists_the_first_reset_trigger() {
    let payload = parse_payload("a=1 :SHIFT b=2 :DAY");
    assert_eq!(payload.reset_trigger, Some(ResetTrigger::Shift));
    assert!(payload.is_reset());
    assert_eq!(payload.tokens, vec![upsert("a", "1"), upsert("b", "2")]);

    let plain = parse_payload("a=1");
    assert!(!plain.is_reset());
}

#[test]
fn reset_trigger_names_round_trip() {
    for name in [
        "MANUAL",
        "DAY",
        "SHIFT",
        "WEEK",
        "MONTH",
        "ANNUAL",
        "ACTION_COMPLETE",
        "MAINTENANCE",
        "LIFE",
        "POWER_ON_TIME",
    ] {
        let trigger = ResetTrigger::from_name(name);
        assert!(!matches!(trigger, ResetTrigger::Other(_)), "{name} not mapped");
        assert_eq!(trigger.to_string(), name);
    }
}
