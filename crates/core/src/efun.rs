//! Registry of driver built-ins (efuns).
//!
//! The compiler resolves bare calls against this table after checking the
//! program's own functions; the driver dispatches on the enum. Argument
//! counts are validated in one place by the dispatcher, so the table also
//! records each efun's accepted arity range.

macro_rules! efuns {
    ($( $variant:ident => $name:literal, $min:literal ..= $max:literal; )*) => {
        /// Every built-in callable from script code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Efun {
            $( $variant, )*
        }

        impl Efun {
            pub fn from_name(name: &str) -> Option<Efun> {
                match name {
                    $( $name => Some(Efun::$variant), )*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( Efun::$variant => $name, )*
                }
            }

            /// Accepted argument count range, inclusive.
            pub fn arity(self) -> (u8, u8) {
                match self {
                    $( Efun::$variant => ($min, $max), )*
                }
            }
        }
    };
}

efuns! {
    // Identity and the object tree
    ThisObject => "this_object", 0..=0;
    ThisPlayer => "this_player", 0..=0;
    CallerObject => "caller_object", 0..=0;
    CloneObject => "clone", 1..=1;
    Destruct => "destruct", 1..=1;
    MoveObject => "move_object", 2..=2;
    Location => "location", 1..=1;
    Contents => "contents", 1..=1;
    NextObject => "next_object", 1..=1;
    Present => "present", 1..=2;
    Attach => "attach", 1..=1;
    Detach => "detach", 0..=1;
    ThisComponent => "this_component", 0..=0;
    Prototype => "prototype", 1..=1;
    Children => "children", 1..=1;
    Objects => "objects", 0..=0;
    AllInventory => "all_inventory", 1..=1;

    // Dynamic dispatch and compilation
    CallOther => "call_other", 2..=255;
    Command => "command", 2..=2;
    CompileObject => "compile_object", 1..=1;
    CompileString => "compile_string", 1..=1;

    // Strings
    Strlen => "strlen", 1..=1;
    Leftstr => "leftstr", 2..=2;
    Rightstr => "rightstr", 2..=2;
    Midstr => "midstr", 3..=3;
    Subst => "subst", 4..=4;
    InStr => "instr", 3..=3;
    Upcase => "upcase", 1..=1;
    Downcase => "downcase", 1..=1;
    Atoi => "atoi", 1..=1;
    Itoa => "itoa", 1..=1;
    Otoa => "otoa", 1..=1;
    Atoo => "atoo", 1..=1;
    Sprintf => "sprintf", 1..=255;
    Sscanf => "sscanf", 2..=255;
    ReplaceString => "replace_string", 3..=3;
    Crypt => "crypt", 1..=2;
    Chr => "chr", 1..=1;
    Asc => "asc", 1..=1;

    // Arrays
    Sizeof => "sizeof", 1..=1;
    Implode => "implode", 2..=2;
    Explode => "explode", 2..=2;
    MemberArray => "member_array", 2..=2;
    SortArray => "sort_array", 1..=2;
    Reverse => "reverse", 1..=1;
    UniqueArray => "unique_array", 1..=1;

    // Mappings
    Keys => "keys", 1..=1;
    Values => "values", 1..=1;
    Member => "member", 2..=2;
    MapDelete => "map_delete", 2..=2;

    // Files (all master-gated)
    ReadFile => "read_file", 1..=3;
    WriteFile => "write_file", 2..=2;
    Remove => "remove", 1..=1;
    Rename => "rename", 2..=2;
    GetDir => "get_dir", 1..=1;
    FileSize => "file_size", 1..=1;
    Mkdir => "mkdir", 1..=1;
    Rmdir => "rmdir", 1..=1;
    Chmod => "chmod", 2..=2;
    Chown => "chown", 2..=2;
    Fstat => "fstat", 1..=1;
    Fowner => "fowner", 1..=1;

    // Connections and devices
    Users => "users", 0..=0;
    NextWho => "next_who", 1..=1;
    Connected => "connected", 1..=1;
    Interactive => "interactive", 1..=1;
    SetInteractive => "set_interactive", 2..=2;
    GetDevconn => "get_devconn", 1..=1;
    SendDevice => "send_device", 2..=2;
    SendPrompt => "send_prompt", 2..=2;
    ReconnectDevice => "reconnect_device", 1..=2;
    DisconnectDevice => "disconnect_device", 0..=1;
    FlushDevice => "flush_device", 0..=1;
    QueryTerminal => "query_terminal", 1..=1;
    GetMssp => "get_mssp", 0..=0;
    SetMssp => "set_mssp", 1..=1;
    GetDevidle => "get_devidle", 1..=1;
    GetConntime => "get_conntime", 1..=1;
    GetDevport => "get_devport", 1..=1;
    RedirectInput => "redirect_input", 1..=1;
    GetInputFunc => "get_input_func", 1..=1;
    InputTo => "input_to", 2..=2;

    // Timing
    Time => "time", 0..=0;
    Mktime => "mktime", 1..=1;
    Alarm => "alarm", 2..=2;
    RemoveAlarm => "remove_alarm", 2..=2;
    SetHeartBeat => "set_heart_beat", 1..=1;

    // Persistence
    SaveValue => "save_value", 1..=1;
    RestoreValue => "restore_value", 1..=1;
    SaveObject => "save_object", 1..=1;
    RestoreObject => "restore_object", 1..=1;

    // Administration
    Sysctl => "sysctl", 1..=1;
    Syslog => "syslog", 1..=1;
    Syswrite => "syswrite", 1..=1;

    // Misc
    Typeof => "typeof", 1..=1;
    Random => "random", 1..=1;
    Itoo => "itoo", 1..=1;
    Otoi => "otoi", 1..=1;
    SetPriv => "set_priv", 2..=2;
    Priv => "priv", 1..=1;
    InEditor => "in_editor", 1..=1;
    IsLegal => "is_legal", 1..=1;
    GetMaster => "get_master", 0..=0;
    IsMaster => "is_master", 1..=1;

    // Verbs
    AddVerb => "add_verb", 2..=2;
    AddXverb => "add_xverb", 2..=2;
    RemoveVerb => "remove_verb", 1..=1;
    NextVerb => "next_verb", 2..=2;
    SetLocalverbs => "set_localverbs", 1..=1;
    Localverbs => "localverbs", 1..=1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for efun in [Efun::CallOther, Efun::Sprintf, Efun::SetHeartBeat] {
            assert_eq!(Efun::from_name(efun.name()), Some(efun));
        }
        assert_eq!(Efun::from_name("no_such_efun"), None);
    }

    #[test]
    fn test_arity_ranges() {
        assert_eq!(Efun::ThisObject.arity(), (0, 0));
        assert_eq!(Efun::CallOther.arity(), (2, 255));
        assert_eq!(Efun::ReadFile.arity(), (1, 3));
    }
}
