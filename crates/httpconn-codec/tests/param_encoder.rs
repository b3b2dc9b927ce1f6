use httpconn_codec::param_encoder::{ParamPair, build_header_value, build_param_query_key, encode_query_values};
use httpconn_schema::{ParamEncoding, ParamStyle};

fn encoding(style: ParamStyle, explode: Option<bool>) -> ParamEncoding {
    ParamEncoding {
        style,
        explode,
        allow_reserved: false,
        content_type: None,
        headers: vec![],
    }
}

#[test]
fn form_explode_scalar() {
    let pair = ParamPair {
        keys: vec![],
        values: vec!["blue".to_string()],
    };
    let out = build_param_query_key("color", &encoding(ParamStyle::Form, None), &pair);
    assert_eq!(out, vec![("color".to_string(), "blue".to_string())]);
}

#[test]
fn form_array_exploded_repeats_the_key() {
    let pair = ParamPair {
        keys: vec![],
        values: vec!["blue".to_string(), "black".to_string(), "brown".to_string()],
    };
    let out = build_param_query_key("color", &encoding(ParamStyle::Form, Some(true)), &pair);
    assert_eq!(
        out,
        vec![
            ("color".to_string(), "blue".to_string()),
            ("color".to_string(), "black".to_string()),
            ("color".to_string(), "brown".to_string()),
        ]
    );
}

#[test]
fn form_array_unexploded_joins_with_comma() {
    let pair = ParamPair {
        keys: vec![],
        values: vec!["blue".to_string(), "black".to_string(), "brown".to_string()],
    };
    let out = build_param_query_key("color", &encoding(ParamStyle::Form, Some(false)), &pair);
    assert_eq!(out, vec![("color".to_string(), "blue,black,brown".to_string())]);
}

#[test]
fn space_delimited_unexploded() {
    let pair = ParamPair {
        keys: vec![],
        values: vec!["blue".to_string(), "black".to_string()],
    };
    let out = build_param_query_key("color", &encoding(ParamStyle::SpaceDelimited, Some(false)), &pair);
    assert_eq!(out, vec![("color".to_string(), "blue black".to_string())]);
}

#[test]
fn pipe_delimited_unexploded() {
    let pair = ParamPair {
        keys: vec![],
        values: vec!["blue".to_string(), "black".to_string()],
    };
    let out = build_param_query_key("color", &encoding(ParamStyle::PipeDelimited, Some(false)), &pair);
    assert_eq!(out, vec![("color".to_string(), "blue|black".to_string())]);
}

/// A deepObject array-of-objects field, where the array recursion has
/// already merged repeated key paths into one pair with both values.
#[test]
fn deep_object_nested_array_field() {
    let pair = ParamPair {
        keys: vec!["role".to_string(), String::new(), "user".to_string(), String::new()],
        values: vec!["admin".to_string(), "anonymous".to_string()],
    };
    let out = build_param_query_key("id", &encoding(ParamStyle::DeepObject, None), &pair);
    assert_eq!(
        out,
        vec![
            ("id[role][][user][]".to_string(), "admin".to_string()),
            ("id[role][][user][]".to_string(), "anonymous".to_string()),
        ]
    );
}

#[test]
fn deep_object_flat_fields() {
    let pair = ParamPair {
        keys: vec!["role".to_string()],
        values: vec!["admin".to_string()],
    };
    let out = build_param_query_key("id", &encoding(ParamStyle::DeepObject, None), &pair);
    assert_eq!(out, vec![("id[role]".to_string(), "admin".to_string())]);
}

#[test]
fn form_object_exploded_uses_member_names_as_keys() {
    let pair = ParamPair {
        keys: vec!["role".to_string(), "firstName".to_string()],
        values: vec!["admin".to_string(), "Alex".to_string()],
    };
    let out = build_param_query_key("id", &encoding(ParamStyle::Form, Some(true)), &pair);
    assert_eq!(
        out,
        vec![
            ("role".to_string(), "admin".to_string()),
            ("firstName".to_string(), "Alex".to_string()),
        ]
    );
}

#[test]
fn header_value_exploded_object() {
    let pair = ParamPair {
        keys: vec!["role".to_string(), "firstName".to_string()],
        values: vec!["admin".to_string(), "Alex".to_string()],
    };
    assert_eq!(build_header_value(&pair, true), "role=admin,firstName=Alex");
}

#[test]
fn header_value_unexploded_object() {
    let pair = ParamPair {
        keys: vec!["role".to_string(), "firstName".to_string()],
        values: vec!["admin".to_string(), "Alex".to_string()],
    };
    assert_eq!(build_header_value(&pair, false), "role,admin,firstName,Alex");
}

#[test]
fn query_values_percent_encode_reserved_characters() {
    let pairs = vec![("q".to_string(), "a b&c".to_string())];
    assert_eq!(encode_query_values(&pairs, false), "q=a%20b%26c");
}

#[test]
fn query_values_allow_reserved_skips_encoding() {
    let pairs = vec![("filter".to_string(), "a[b]=c".to_string())];
    assert_eq!(encode_query_values(&pairs, true), "filter=a[b]=c");
}
