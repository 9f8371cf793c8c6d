// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The invariant properties spec.md §8 states outside the ten numbered
//! scenarios (covered by `engine/tests/scenarios.rs`). `JSON.stringify`'s
//! cyclic-object check is excluded — `JSON` is built-in library content
//! (spec §1's Non-goals) this core never provides.

use tiny42js_engine::{new_engine, Options};

fn eval(src: &str) -> std::string::String {
    let mut engine = new_engine(Options::default());
    engine.evaluate(src, "test.js").expect("evaluate")
}

fn eval_err_kind(src: &str) -> tiny42js_engine::error::ErrorKind {
    let mut engine = new_engine(Options::default());
    engine.evaluate(src, "test.js").unwrap_err().kind
}

#[test]
fn to_primitive_number_hint_calls_at_most_one_fallback() {
    let out = eval(
        "var valCalls = 0, strCalls = 0;
         var o = {
           valueOf: function(){ valCalls++; return {}; },
           toString: function(){ strCalls++; return 5; }
         };
         var r = o + 1;
         r + ',' + valCalls + ',' + strCalls;",
    );
    assert_eq!(out, "6,1,1");
}

#[test]
fn to_primitive_number_hint_throws_when_both_fallbacks_are_non_primitive() {
    let kind = eval_err_kind(
        "var o = { valueOf: function(){ return {}; }, toString: function(){ return {}; } }; o + 1;",
    );
    assert_eq!(kind, tiny42js_engine::error::ErrorKind::TypeError);
}

#[test]
fn parse_int_round_trip_is_stable_for_finite_values() {
    let mut engine = new_engine(Options::default());
    engine
        .add_native("function parseInt(s, radix)", |ctx| {
            let s = ctx.engine.to_string_value(ctx.arg(0)).map_err(|c| ctx.engine.completion_to_js_error(c))?;
            let radix = if matches!(ctx.arg(1), tiny42js_engine::value::Value::Undefined) {
                0
            } else {
                ctx.engine.to_number(ctx.arg(1)).map_err(|c| ctx.engine.completion_to_js_error(c))?.to_uint32()
            };
            Ok(tiny42js_engine::value::Value::Number(tiny42js_engine::number::Number::parse_int(&s, radix)))
        })
        .expect("add_native parseInt");
    let out = engine
        .evaluate(
            "var x = 'notanumber'; var once = parseInt(x, 10); var twice = parseInt('' + once, 10); once + ',' + twice;",
            "test.js",
        )
        .expect("evaluate");
    assert_eq!(out, "NaN,NaN");

    let out = engine
        .evaluate("var once = parseInt('123abc', 10); var twice = parseInt('' + once, 10); once + ',' + twice;", "test.js")
        .expect("evaluate");
    assert_eq!(out, "123,123");
}

#[test]
fn nested_object_destructuring_default_fills_in_only_the_missing_leaf() {
    let out = eval("var d = 99; var v = {a: {}}; var {a: {b = d}} = v; b;");
    assert_eq!(out, "99");
}

#[test]
fn nested_object_destructuring_throws_when_the_intermediate_is_undefined() {
    let kind = eval_err_kind("var d = 99; var v = {}; var {a: {b = d}} = v;");
    assert_eq!(kind, tiny42js_engine::error::ErrorKind::TypeError);
}

#[test]
fn yield_is_a_return_operand_inside_a_generator_body() {
    let out = eval("function* g(){ return yield 1; } var it = g(); var y1 = it.next(); var y2 = it.next(42); y1 + ',' + y2;");
    assert_eq!(out, "1,42");
}

#[test]
fn yield_is_an_ordinary_identifier_outside_a_generator_body() {
    let out = eval("var yield = 5; yield + 1;");
    assert_eq!(out, "6");
}

#[test]
fn per_iteration_let_binding_gives_each_closure_a_distinct_value() {
    let out = eval(
        "var closures = [];
         var n = 4;
         for (let i = 0; i < n; ++i) { closures[i] = function(){ return i; }; }
         var seen = '';
         for (var k = 0; k < n; ++k) { seen += closures[k](); }
         seen;",
    );
    assert_eq!(out, "0123");
}

#[test]
fn const_reassignment_is_a_type_error() {
    let kind = eval_err_kind("const x = 1; x = 2;");
    assert_eq!(kind, tiny42js_engine::error::ErrorKind::TypeError);
}

#[test]
fn prototype_constructor_identity_survives_unrelated_property_writes() {
    let out = eval(
        "function F(){} var before = F.prototype.constructor === F;
         F.extra = 1; F.prototype.extra = 2;
         var after = F.prototype.constructor === F;
         before + ',' + after;",
    );
    assert_eq!(out, "true,true");
}

#[test]
fn new_target_is_undefined_outside_new_and_the_constructor_inside_it() {
    let out = eval(
        "function F(){ this.insideCtor = (new.target === F); }
         var plainCall = (function(){ return new.target === undefined; })();
         var f = new F();
         plainCall + ',' + f.insideCtor;",
    );
    assert_eq!(out, "true,true");
}
