//! Change-form schema construction
//!
//! Builds the four change-form sections from resolved change types and
//! their probed flags:
//! 1. `wbChangeTypes`, the change type enumeration
//! 2. `wbChangeFlagsNNN`, one 32-bit flag set per change type
//! 3. `wbChangeFlags` plus one two-arm `wbUnion<Flag>` per named flag
//! 4. `wbChangedFormData`, every change type's flag unions behind one union

use std::collections::HashMap;

use tracing::trace;

use super::ident::{IdentRequest, IdentScope};
use super::node::{Decl, FlagSlot, Leaf, SchemaNode};
use crate::flags::{Discriminant, DiscriminantTable, FlagTable, FLAG_BITS};

/// A flag union declaration with the change type and bit it models
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagUnion {
    pub code: u32,
    pub bit: u8,
    pub decl: Decl,
}

/// Per change type declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeTypeSchema {
    pub discriminant: Discriminant,
    pub flag_set: Decl,
    pub unions: Vec<FlagUnion>,
}

/// Everything the four change-form sections print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFormSchema {
    pub change_types: Decl,
    pub per_type: Vec<ChangeTypeSchema>,
    pub flags_union: Decl,
    pub changed_form: Decl,
}

pub const CHANGE_TYPES_IDENT: &str = "wbChangeTypes";
pub const CHANGE_FLAGS_IDENT: &str = "wbChangeFlags";
pub const CHANGED_FORM_IDENT: &str = "wbChangedFormData";
pub const UNION_PREFIX: &str = "wbUnion";

fn flag_set_ident(code: u32) -> String {
    format!("{}{:03}", CHANGE_FLAGS_IDENT, code)
}

/// All 32 slots for one change type, placeholders where the host had no name
fn flag_slots(code: u32, flags: Option<&FlagTable>) -> Vec<FlagSlot> {
    (0..FLAG_BITS)
        .map(|bit| match flags.and_then(|t| t.entry(bit)) {
            Some(entry) => FlagSlot::named(bit, entry.name.clone(), entry.description.clone()),
            None => {
                trace!(code, bit, "placeholder flag name");
                FlagSlot::placeholder(bit)
            }
        })
        .collect()
}

impl ChangeFormSchema {
    pub fn build(discriminants: &DiscriminantTable, flags: &[FlagTable]) -> Self {
        let by_code: HashMap<u32, &FlagTable> = flags.iter().map(|t| (t.code, t)).collect();
        let mut scope = IdentScope::new();
        for fixed in [CHANGE_TYPES_IDENT, CHANGE_FLAGS_IDENT, CHANGED_FORM_IDENT] {
            scope.reserve(fixed);
        }

        let change_types = Decl::new(
            CHANGE_TYPES_IDENT,
            SchemaNode::Enum {
                entries: discriminants
                    .iter()
                    .map(|d| format!("{:02} ({:03X} : {})", d.code, d.form_type, d.name))
                    .collect(),
            },
        );

        // Flag union identifiers share one scope across all change types
        let requests: Vec<IdentRequest> = discriminants
            .iter()
            .flat_map(|d| {
                by_code
                    .get(&d.code)
                    .into_iter()
                    .flat_map(|t| t.entries.iter())
                    .map(move |e| IdentRequest {
                        code: d.code,
                        bit: e.bit,
                        display: e.name.clone(),
                    })
            })
            .collect();
        for d in discriminants.iter() {
            scope.reserve(&flag_set_ident(d.code));
        }
        let mut idents = scope.assign(UNION_PREFIX, &requests).into_iter();

        let mut per_type = Vec::with_capacity(discriminants.len());
        for d in discriminants.iter() {
            let table = by_code.get(&d.code).copied();

            let flag_set = Decl::new(
                flag_set_ident(d.code),
                SchemaNode::FlagSet {
                    label: "Change Flags".to_string(),
                    slots: flag_slots(d.code, table),
                },
            )
            .with_comment(format!(
                "changeType: {:03} = formType: {:03} : {}",
                d.code, d.form_type, d.name
            ));

            let mut unions = Vec::new();
            for entry in table.map(|t| t.entries.as_slice()).unwrap_or_default() {
                let Some(ident) = idents.next() else {
                    break;
                };
                let label = entry
                    .description
                    .clone()
                    .unwrap_or_else(|| entry.name.clone());
                unions.push(FlagUnion {
                    code: d.code,
                    bit: entry.bit,
                    decl: Decl::new(
                        ident,
                        SchemaNode::Union {
                            label,
                            decider: format!("ChangedFlag{:02}Decider", entry.bit),
                            variants: vec![
                                SchemaNode::Leaf(Leaf::Null),
                                SchemaNode::Leaf(Leaf::Null),
                            ],
                        },
                    ),
                });
            }

            per_type.push(ChangeTypeSchema {
                discriminant: d.clone(),
                flag_set,
                unions,
            });
        }

        let flags_union = Decl::new(
            CHANGE_FLAGS_IDENT,
            SchemaNode::Union {
                label: "Change Flags".to_string(),
                decider: "ChangedFormFlagsDecider".to_string(),
                variants: per_type
                    .iter()
                    .map(|t| SchemaNode::Ref(t.flag_set.ident.clone()))
                    .collect(),
            },
        );

        let mut form_variants = vec![SchemaNode::Leaf(Leaf::Null)];
        form_variants.extend(per_type.iter().map(|t| SchemaNode::Struct {
            label: format!("Change {} Data", t.discriminant.name),
            note: Some(format!("{:03X}", t.discriminant.form_type)),
            fields: t
                .unions
                .iter()
                .map(|u| SchemaNode::Ref(u.decl.ident.clone()))
                .collect(),
        }));

        let changed_form = Decl::new(
            CHANGED_FORM_IDENT,
            SchemaNode::Struct {
                label: "Changed Form Data".to_string(),
                note: None,
                fields: vec![
                    SchemaNode::Ref("wbInitialDataType".to_string()),
                    SchemaNode::Union {
                        label: "CForm Union".to_string(),
                        decider: "ChangedFormDataDecider".to_string(),
                        variants: form_variants,
                    },
                    SchemaNode::Leaf(Leaf::ByteArray {
                        label: "Undecoded Data".to_string(),
                        counter: "ChangedFormRemainingDataCounter".to_string(),
                    }),
                ],
            },
        );

        Self {
            change_types,
            per_type,
            flags_union,
            changed_form,
        }
    }

    pub fn change_type(&self, code: u32) -> Option<&ChangeTypeSchema> {
        self.per_type.iter().find(|t| t.discriminant.code == code)
    }

    /// Section 1: change type enumeration
    pub fn change_type_lines(&self) -> Vec<String> {
        self.change_types.render()
    }

    /// Section 2: forward declarations, then one flag set per change type
    pub fn flag_set_lines(&self) -> Vec<String> {
        let mut out: Vec<String> = self.per_type.iter().map(|t| t.flag_set.forward()).collect();
        out.push(String::new());
        for t in &self.per_type {
            out.extend(t.flag_set.render());
            out.push(String::new());
        }
        out
    }

    /// Section 3: forward declarations, the outer flags union, then each
    /// change type's flag unions
    pub fn union_lines(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .per_type
            .iter()
            .flat_map(|t| t.unions.iter().map(|u| u.decl.forward()))
            .collect();
        out.push(String::new());
        out.extend(self.flags_union.render());
        out.push(String::new());
        for t in &self.per_type {
            for u in &t.unions {
                out.extend(u.decl.render());
            }
            out.push(String::new());
        }
        out
    }

    /// Section 4: the combined changed-form struct
    pub fn changed_form_lines(&self) -> Vec<String> {
        self.changed_form.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::tests::{discriminants, ScriptedFlags};
    use crate::flags::{FlagEntry, FlagResolver};
    use crate::schema::ident::is_valid_ident;
    use std::collections::HashSet;

    fn entry(bit: u8, name: &str, description: &str) -> FlagEntry {
        FlagEntry {
            bit,
            name: name.to_string(),
            description: Some(description.to_string()),
        }
    }

    #[test]
    fn test_single_named_flag_and_placeholders() {
        let table = discriminants(&[(5, 0x2D, "NPC_")]);
        let flags = ScriptedFlags::default().with(0x2D, 2, "Essential", "Actor is essential");
        let probed = FlagResolver::new(&flags, &table).probe_all();

        let schema = ChangeFormSchema::build(&table, &probed);
        let npc = schema.change_type(5).unwrap();

        let SchemaNode::FlagSet { slots, .. } = &npc.flag_set.node else {
            panic!("expected flag set");
        };
        assert_eq!(slots.len(), 32);

        let named: Vec<_> = slots.iter().filter(|s| !s.placeholder).collect();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].bit, 2);
        assert_eq!(named[0].name, "Essential");

        for slot in slots.iter().filter(|s| s.placeholder) {
            assert_eq!(slot.name, format!("UnnamedFlag{:02}", slot.bit));
        }
        let bits: Vec<u8> = slots.iter().map(|s| s.bit).collect();
        assert_eq!(bits, (0..32).collect::<Vec<u8>>());
    }

    #[test]
    fn test_colliding_flag_names_across_change_types() {
        let table = discriminants(&[(5, 0x2D, "NPC_"), (7, 0x31, "CONT")]);
        let flags = vec![
            FlagTable {
                code: 5,
                entries: vec![entry(3, "Open!", "Door open")],
            },
            FlagTable {
                code: 7,
                entries: vec![entry(3, "Open!", "Container open")],
            },
        ];

        let schema = ChangeFormSchema::build(&table, &flags);
        let a = &schema.change_type(5).unwrap().unions[0].decl.ident;
        let b = &schema.change_type(7).unwrap().unions[0].decl.ident;
        assert_eq!(a, "wbUnionOpen_5");
        assert_eq!(b, "wbUnionOpen_7");

        let lines = schema.union_lines();
        assert!(lines.contains(&"  wbUnionOpen_5 : IwbUnionDef;".to_string()));
        assert!(lines.contains(
            &"  wbUnionOpen_7 := wbUnion('Container open', ChangedFlag03Decider, [wbNull, wbNull]);"
                .to_string()
        ));
    }

    #[test]
    fn test_all_declared_identifiers_distinct_and_valid() {
        let table = discriminants(&[(0, 0x0D, "CLAS"), (1, 0x10, "FACT"), (2, 0x20, "ARMO")]);
        let flags = vec![
            FlagTable {
                code: 0,
                entries: vec![entry(1, "Flags", ""), entry(2, "ChangeFlags000", "")],
            },
            FlagTable {
                code: 1,
                entries: vec![entry(1, "Flags", ""), entry(4, "Reactions", "")],
            },
            FlagTable {
                code: 2,
                entries: vec![entry(0, "Flags!", ""), entry(9, "", "")],
            },
        ];

        let schema = ChangeFormSchema::build(&table, &flags);
        let mut seen = HashSet::new();
        for ident in [
            &schema.change_types.ident,
            &schema.flags_union.ident,
            &schema.changed_form.ident,
        ] {
            assert!(seen.insert(ident.clone()));
        }
        for t in &schema.per_type {
            assert!(seen.insert(t.flag_set.ident.clone()), "{}", t.flag_set.ident);
            for u in &t.unions {
                assert!(is_valid_ident(&u.decl.ident), "{}", u.decl.ident);
                assert!(seen.insert(u.decl.ident.clone()), "{}", u.decl.ident);
            }
        }
    }

    #[test]
    fn test_change_type_enum_entries() {
        let table = discriminants(&[(0, 0x0D, "CLAS"), (1, 0x10, "FACT")]);
        let schema = ChangeFormSchema::build(&table, &[]);
        assert_eq!(
            schema.change_type_lines(),
            vec![
                "  wbChangeTypes := wbKey2Data6Enum([",
                "    '00 (00D : CLAS)',",
                "    '01 (010 : FACT)'",
                "  ]);",
            ]
        );
    }

    #[test]
    fn test_changed_form_references_unions_in_bit_order() {
        let table = discriminants(&[(0, 0x0D, "CLAS")]);
        let flags = vec![FlagTable {
            code: 0,
            entries: vec![entry(1, "TagSkills", "Tag skills"), entry(30, "Reset", "Reset")],
        }];
        let lines = ChangeFormSchema::build(&table, &flags).changed_form_lines();

        let clas = lines
            .iter()
            .position(|l| l.contains("wbStruct('Change CLAS Data', [ {00D}"))
            .unwrap();
        assert_eq!(lines[clas + 1].trim(), "wbUnionTagSkills,");
        assert_eq!(lines[clas + 2].trim(), "wbUnionReset");
    }

    #[test]
    fn test_flags_union_lists_every_flag_set() {
        let table = discriminants(&[(0, 0x0D, "CLAS"), (1, 0x10, "FACT"), (2, 0x20, "ARMO")]);
        let lines = ChangeFormSchema::build(&table, &[]).union_lines();
        let start = lines
            .iter()
            .position(|l| {
                l == "  wbChangeFlags := wbUnion('Change Flags', ChangedFormFlagsDecider, ["
            })
            .unwrap();
        assert_eq!(lines[start + 1], "    wbChangeFlags000,");
        assert_eq!(lines[start + 2], "    wbChangeFlags001,");
        assert_eq!(lines[start + 3], "    wbChangeFlags002");
        assert_eq!(lines[start + 4], "  ]);");
    }

    #[test]
    fn test_flag_set_comment_and_forward() {
        let table = discriminants(&[(12, 0x2D, "NPC_")]);
        let lines = ChangeFormSchema::build(&table, &[]).flag_set_lines();
        assert_eq!(lines[0], "  wbChangeFlags012 : IwbIntegerDef;");
        assert!(lines.contains(&"  // changeType: 012 = formType: 045 : NPC_".to_string()));
    }
}
