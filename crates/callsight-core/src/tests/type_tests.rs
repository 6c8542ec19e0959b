use crate::types::Type;
use pretty_assertions::assert_eq;

#[test]
fn test_elementary_and_locations() {
    assert_eq!(Type::from_type_string("uint256"), Type::uint256());
    assert_eq!(
        Type::from_type_string("string memory"),
        Type::elementary("string")
    );
    assert_eq!(
        Type::from_type_string("struct Vault.Position storage ref"),
        Type::Struct("Vault.Position".to_string())
    );
    assert_eq!(
        Type::from_type_string("contract IERC20"),
        Type::Contract("IERC20".to_string())
    );
    assert_eq!(Type::from_type_string(""), Type::Unknown);
}

#[test]
fn test_nested_composites() {
    let ty = Type::from_type_string("mapping(address => mapping(uint256 => bool))");
    assert_eq!(ty.to_string(), "mapping(address => mapping(uint256 => bool))");

    let arr = Type::from_type_string("uint256[3][] memory");
    assert_eq!(
        arr,
        Type::Array(
            Box::new(Type::Array(Box::new(Type::uint256()), Some(3))),
            None
        )
    );
    assert_eq!(arr.to_string(), "uint256[3][]");

    let tuple = Type::from_type_string("tuple(uint256,bool)");
    assert!(tuple.is_tuple());
    assert_eq!(tuple.components().len(), 2);
    assert_eq!(Type::uint256().components(), vec![&Type::uint256()]);
}

#[test]
fn test_literal_types() {
    assert_eq!(Type::from_type_string("int_const 1000"), Type::uint256());
    assert_eq!(
        Type::from_type_string("int_const -1"),
        Type::elementary("int256")
    );
    assert_eq!(
        Type::from_type_string("literal_string \"hello\""),
        Type::elementary("string")
    );
    assert_eq!(
        Type::from_type_string("type(contract Token)").contract_name(),
        Some("Token")
    );
}
