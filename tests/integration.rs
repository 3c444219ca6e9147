use std::{cell::RefCell, rc::Rc, str::from_utf8};

use pix_ledger::{
    bin_utils::{ScriptError, Service},
    config::LedgerConfig,
};

const TEST_FILE: &str = include_str!("operations.csv");

#[tokio::test]
async fn replay_operations() {
    let failures = Rc::new(RefCell::new(Vec::new()));
    let mut output = Vec::new();
    let service = Service {
        input: TEST_FILE.as_bytes(),
        output: &mut output,
        config: LedgerConfig::default(),
        error_printer: Box::new({
            let failures = failures.clone();
            move |_line, err| {
                let reason = match &err {
                    ScriptError::Process(err) => err.reason().to_string(),
                    err => err.to_string(),
                };
                failures.borrow_mut().push(reason);
            }
        }),
    };
    service.run().await.unwrap();

    // accounts are printed in label order
    let lines: Vec<&str> = from_utf8(&output).unwrap().lines().collect();
    assert_eq!(
        lines,
        [
            "account,holder,balance,keys,transactions",
            "ana,Ana Silva,750,,2",
            "bruno,Bruno Costa,775,PHONE:11912345678,3",
            "carla,Carla Dias,975,,1",
        ]
    );

    assert_eq!(
        *failures.borrow(),
        [
            "national id already registered",
            "key already registered",
            "insufficient funds",
            "invalid recipient",
            "Unknown account `ghost`",
        ]
    );
}

#[tokio::test]
async fn malformed_rows_are_reported() {
    let script = "\
op,account,target,amount,key_type,key,text,password
register,ana,,10,,12345678901,Ana,secret1
deposit,ana,,10,,,,
transfer,ana,,10,,,,
add_key,ana,,,EMAIL,ana@example.com,,
";
    let failures = Rc::new(RefCell::new(Vec::new()));
    let mut output = Vec::new();
    let service = Service {
        input: script.as_bytes(),
        output: &mut output,
        config: LedgerConfig::default(),
        error_printer: Box::new({
            let failures = failures.clone();
            move |_line, err| failures.borrow_mut().push(err)
        }),
    };
    service.run().await.unwrap();

    let failures = failures.borrow();
    assert_eq!(failures.len(), 3);
    assert!(matches!(failures[0], ScriptError::Malformed(_)));
    assert!(matches!(failures[1], ScriptError::MissingColumn("target")));
    assert!(matches!(&failures[2], ScriptError::Process(err) if err.reason() == "invalid key"));
    assert_eq!(
        from_utf8(&output).unwrap().lines().nth(1),
        Some("ana,Ana,10,,0")
    );
}
