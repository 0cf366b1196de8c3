use indoc::indoc;

use pyino::{ErrorKind, translate};

fn error_kind(source: &str) -> ErrorKind {
    match translate(source) {
        Ok(output) => panic!("expected an error, got:\n{output}"),
        Err(error) => error.kind(),
    }
}

#[test]
fn translation_is_deterministic() {
    let source = indoc! {"
        readings = [0, 0, 0]

        def sample(index):
            readings[index] = analogRead(A0)

        def loop():
            for i in range(3):
                sample(i)
            print(readings[0], readings[1])
    "};
    let first = translate(source).expect("translate");
    for _ in 0..5 {
        assert_eq!(translate(source).expect("translate"), first);
    }
}

#[test]
fn literal_bindings_keep_their_kind() {
    let source = indoc! {r#"
        count = 1
        ratio = 2.5
        ready = True
        label = "hi"
        started = millis()
        seed = random(10)
    "#};
    assert_eq!(
        translate(source).expect("translate"),
        indoc! {r#"
            int count = 1;
            float ratio = 2.5;
            bool ready = true;
            String label = "hi";
            unsigned long started = millis();
            long seed = random(10);
        "#}
    );
}

#[test]
fn counted_loops_lower_to_c_for() {
    let source = indoc! {"
        def loop():
            for i in range(5):
                delay(i)
            for j in range(2, 10, 3):
                delay(j)
            for k in range(10, 0, -1):
                delay(k)
    "};
    assert_eq!(
        translate(source).expect("translate"),
        indoc! {"
            void loop() {
                for (int i = 0; i < 5; i++) {
                    delay(i);
                }
                for (int j = 2; j < 10; j += 3) {
                    delay(j);
                }
                for (int k = 10; k > 0; k--) {
                    delay(k);
                }
            }
        "}
    );
}

#[test]
fn entry_points_stay_void_without_parameters() {
    let output = translate(indoc! {"
        def setup():
            pinMode(13, OUTPUT)

        def loop():
            return
    "})
    .expect("translate");
    assert!(output.contains("void setup() {"));
    assert!(output.contains("void loop() {\n    return;\n}"));

    assert_eq!(
        error_kind("def loop(speed):\n    delay(speed)\n"),
        ErrorKind::UnsupportedConstruct
    );
    assert_eq!(
        error_kind("def setup():\n    return 1\n"),
        ErrorKind::UnsupportedConstruct
    );
}

#[test]
fn mixed_collections_are_rejected() {
    assert_eq!(error_kind("values = [1, True]\n"), ErrorKind::UnsupportedConstruct);
    assert_eq!(error_kind("values = []\n"), ErrorKind::UnsupportedConstruct);
    assert_eq!(
        error_kind("values = [[1], [2]]\n"),
        ErrorKind::UnsupportedConstruct
    );
}

#[test]
fn comments_survive_in_order() {
    let source = indoc! {"
        # first
        led = 13  # pin

        def loop():
            # second
            delay(1)
            # third
            delay(2)
    "};
    assert_eq!(
        translate(source).expect("translate"),
        indoc! {"
            // first
            int led = 13;  // pin

            void loop() {
                // second
                delay(1);
                // third
                delay(2);
            }
        "}
    );
}

#[test]
fn reassignment_must_keep_the_kind() {
    let ok = translate(indoc! {"
        def loop():
            level = 0
            level = level + 1
    "})
    .expect("translate");
    assert!(ok.contains("int level = 0;\n    level = level + 1;"));

    let error = translate(indoc! {"
        def loop():
            level = 0
            level = 0.5
    "})
    .expect_err("retype");
    assert_eq!(error.kind(), ErrorKind::TypeInconsistency);
    assert_eq!(error.line(), 3);
}

#[test]
fn first_assignment_inside_a_block_is_hoisted() {
    let source = indoc! {"
        def loop():
            if digitalRead(2) == HIGH:
                state = 1
            else:
                state = 0
            digitalWrite(13, state)
    "};
    assert_eq!(
        translate(source).expect("translate"),
        indoc! {"
            void loop() {
                int state;
                if (digitalRead(2) == HIGH) {
                    state = 1;
                } else {
                    state = 0;
                }
                digitalWrite(13, state);
            }
        "}
    );
}

#[test]
fn return_and_parameter_kinds_come_from_use() {
    let source = indoc! {"
        def twice(x):
            return x * 2

        def loop():
            value = twice(3)
            delay(value)
    "};
    assert_eq!(
        translate(source).expect("translate"),
        indoc! {"
            int twice(int x) {
                return x * 2;
            }

            void loop() {
                int value = twice(3);
                delay(value);
            }
        "}
    );
}

#[test]
fn builtin_calls_are_rewritten() {
    let source = indoc! {r#"
        names = [1, 2]

        def loop():
            print("n", len(names))
            text = str(analogRead(A0))
            print(text)
    "#};
    assert_eq!(
        translate(source).expect("translate"),
        indoc! {r#"
            int names[2] = {1, 2};

            void loop() {
                Serial.print("n");
                Serial.print(" ");
                Serial.println((sizeof(names) / sizeof(names[0])));
                String text = String(analogRead(A0));
                Serial.println(text);
            }
        "#}
    );
}

#[test]
fn rejected_constructs_report_their_kind() {
    let cases = [
        ("x = \"open\n", ErrorKind::Lex),
        ("def loop():\n    x = (1 +\n", ErrorKind::Parse),
        ("def loop():\n    while True:\n        pass\n", ErrorKind::UnsupportedConstruct),
        ("class Led:\n    pass\n", ErrorKind::UnsupportedConstruct),
        ("def loop():\n    a, b = 1, 2\n", ErrorKind::UnsupportedConstruct),
        ("def loop():\n    x = 1 if True else 2\n", ErrorKind::UnsupportedConstruct),
        ("def loop():\n    x = 3 / 2\n", ErrorKind::UnsupportedConstruct),
        ("def loop():\n    x = \"a\" + 1\n", ErrorKind::TypeInconsistency),
        ("def loop():\n    delay(wait)\n", ErrorKind::UnboundName),
    ];
    for (source, expected) in cases {
        assert_eq!(error_kind(source), expected, "for {source:?}");
    }
}
