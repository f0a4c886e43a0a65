//! Request dispatch
//!
//! Looks up the handler for an opcode, enforces the opcode's length rule and
//! turns the handler's outcome into wire output. Handlers run with the
//! server locked; they decode their own arguments from the request body and
//! queue replies on the [`Request`].

use super::handlers::{colors, fonts, graphics, input, misc, properties, windows};
use super::Server;
use crate::protocol::*;

/// One decoded request on its way through a handler
pub struct Request<'a> {
    pub client: ClientId,
    pub opcode: RequestOpcode,
    /// The generic byte of the header
    pub detail: u8,
    pub sequence: u16,
    pub order: ByteOrder,
    pub body: RequestBody<'a>,
    replies: Vec<Vec<u8>>,
}

impl<'a> Request<'a> {
    pub fn new(
        client: ClientId,
        opcode: RequestOpcode,
        detail: u8,
        sequence: u16,
        order: ByteOrder,
        body: &'a [u8],
    ) -> Self {
        Request {
            client,
            opcode,
            detail,
            sequence,
            order,
            body: RequestBody::new(body, order),
            replies: Vec::new(),
        }
    }

    /// Start a reply to this request with `data` in byte 1
    pub fn reply_writer(&self, data: u8) -> WireWriter {
        WireWriter::reply(self.order, data, self.sequence)
    }

    pub fn encoder(&self) -> ProtocolEncoder {
        ProtocolEncoder::new(self.order)
    }

    /// Queue a finished reply
    pub fn respond(&mut self, reply: Vec<u8>) {
        self.replies.push(reply);
    }

    pub fn into_replies(self) -> Vec<Vec<u8>> {
        self.replies
    }
}

pub type Handler = fn(&mut Server, &mut Request<'_>) -> X11Result<()>;

/// The handler table
pub fn handler(opcode: RequestOpcode) -> Handler {
    use RequestOpcode::*;
    match opcode {
        CreateWindow => windows::handle_create_window,
        ChangeWindowAttributes => windows::handle_change_window_attributes,
        GetWindowAttributes => windows::handle_get_window_attributes,
        DestroyWindow => windows::handle_destroy_window,
        DestroySubwindows => windows::handle_destroy_subwindows,
        ChangeSaveSet => windows::handle_change_save_set,
        ReparentWindow => windows::handle_reparent_window,
        MapWindow => windows::handle_map_window,
        MapSubwindows => windows::handle_map_subwindows,
        UnmapWindow => windows::handle_unmap_window,
        UnmapSubwindows => windows::handle_unmap_subwindows,
        ConfigureWindow => windows::handle_configure_window,
        CirculateWindow => windows::handle_circulate_window,
        GetGeometry => windows::handle_get_geometry,
        QueryTree => windows::handle_query_tree,
        InternAtom => properties::handle_intern_atom,
        GetAtomName => properties::handle_get_atom_name,
        ChangeProperty => properties::handle_change_property,
        DeleteProperty => properties::handle_delete_property,
        GetProperty => properties::handle_get_property,
        ListProperties => properties::handle_list_properties,
        SetSelectionOwner => properties::handle_set_selection_owner,
        GetSelectionOwner => properties::handle_get_selection_owner,
        ConvertSelection => properties::handle_convert_selection,
        SendEvent => input::handle_send_event,
        GrabPointer => input::handle_grab_pointer,
        UngrabPointer => input::handle_ungrab_pointer,
        GrabButton => input::handle_grab_button,
        UngrabButton => input::handle_ungrab_button,
        ChangeActivePointerGrab => input::handle_change_active_pointer_grab,
        GrabKeyboard => input::handle_grab_keyboard,
        UngrabKeyboard => input::handle_ungrab_keyboard,
        GrabKey => input::handle_grab_key,
        UngrabKey => input::handle_ungrab_key,
        AllowEvents => input::handle_allow_events,
        GrabServer => input::handle_grab_server,
        UngrabServer => input::handle_ungrab_server,
        QueryPointer => input::handle_query_pointer,
        GetMotionEvents => input::handle_get_motion_events,
        TranslateCoordinates => windows::handle_translate_coordinates,
        WarpPointer => input::handle_warp_pointer,
        SetInputFocus => input::handle_set_input_focus,
        GetInputFocus => input::handle_get_input_focus,
        QueryKeymap => input::handle_query_keymap,
        OpenFont => fonts::handle_open_font,
        CloseFont => fonts::handle_close_font,
        QueryFont => fonts::handle_query_font,
        QueryTextExtents => fonts::handle_query_text_extents,
        ListFonts => fonts::handle_list_fonts,
        ListFontsWithInfo => fonts::handle_list_fonts_with_info,
        SetFontPath => fonts::handle_set_font_path,
        GetFontPath => fonts::handle_get_font_path,
        CreatePixmap => graphics::handle_create_pixmap,
        FreePixmap => graphics::handle_free_pixmap,
        CreateGC => graphics::handle_create_gc,
        ChangeGC => graphics::handle_change_gc,
        CopyGC => graphics::handle_copy_gc,
        SetDashes => graphics::handle_set_dashes,
        SetClipRectangles => graphics::handle_set_clip_rectangles,
        FreeGC => graphics::handle_free_gc,
        ClearArea => graphics::handle_clear_area,
        CopyArea => graphics::handle_copy_area,
        CopyPlane => graphics::handle_copy_plane,
        PolyPoint => graphics::handle_poly_point,
        PolyLine => graphics::handle_poly_line,
        PolySegment => graphics::handle_poly_segment,
        PolyRectangle => graphics::handle_poly_rectangle,
        PolyArc => graphics::handle_poly_arc,
        FillPoly => graphics::handle_fill_poly,
        PolyFillRectangle => graphics::handle_poly_fill_rectangle,
        PolyFillArc => graphics::handle_poly_fill_arc,
        PutImage => graphics::handle_put_image,
        GetImage => graphics::handle_get_image,
        PolyText8 => graphics::handle_poly_text8,
        PolyText16 => graphics::handle_poly_text16,
        ImageText8 => graphics::handle_image_text8,
        ImageText16 => graphics::handle_image_text16,
        CreateColormap => colors::handle_create_colormap,
        FreeColormap => colors::handle_free_colormap,
        CopyColormapAndFree => colors::handle_copy_colormap_and_free,
        InstallColormap => colors::handle_install_colormap,
        UninstallColormap => colors::handle_uninstall_colormap,
        ListInstalledColormaps => colors::handle_list_installed_colormaps,
        AllocColor => colors::handle_alloc_color,
        AllocNamedColor => colors::handle_alloc_named_color,
        AllocColorCells => colors::handle_alloc_color_cells,
        AllocColorPlanes => colors::handle_alloc_color_planes,
        FreeColors => colors::handle_free_colors,
        StoreColors => colors::handle_store_colors,
        StoreNamedColor => colors::handle_store_named_color,
        QueryColors => colors::handle_query_colors,
        LookupColor => colors::handle_lookup_color,
        CreateCursor => colors::handle_create_cursor,
        CreateGlyphCursor => colors::handle_create_glyph_cursor,
        FreeCursor => colors::handle_free_cursor,
        RecolorCursor => colors::handle_recolor_cursor,
        QueryBestSize => colors::handle_query_best_size,
        QueryExtension => misc::handle_query_extension,
        ListExtensions => misc::handle_list_extensions,
        ChangeKeyboardMapping => misc::handle_change_keyboard_mapping,
        GetKeyboardMapping => misc::handle_get_keyboard_mapping,
        ChangeKeyboardControl => misc::handle_change_keyboard_control,
        GetKeyboardControl => misc::handle_get_keyboard_control,
        Bell => misc::handle_bell,
        ChangePointerControl => misc::handle_change_pointer_control,
        GetPointerControl => misc::handle_get_pointer_control,
        SetScreenSaver => misc::handle_set_screen_saver,
        GetScreenSaver => misc::handle_get_screen_saver,
        ChangeHosts => misc::handle_change_hosts,
        ListHosts => misc::handle_list_hosts,
        SetAccessControl => misc::handle_set_access_control,
        SetCloseDownMode => misc::handle_set_close_down_mode,
        KillClient => misc::handle_kill_client,
        RotateProperties => properties::handle_rotate_properties,
        ForceScreenSaver => misc::handle_force_screen_saver,
        SetPointerMapping => misc::handle_set_pointer_mapping,
        GetPointerMapping => misc::handle_get_pointer_mapping,
        SetModifierMapping => misc::handle_set_modifier_mapping,
        GetModifierMapping => misc::handle_get_modifier_mapping,
        NoOperation => misc::handle_no_operation,
    }
}

/// Run one request whose complete body has been read. Returns the replies
/// to send, or the error to report; the error carries the major opcode.
pub fn dispatch(
    server: &mut Server,
    client: ClientId,
    sequence: u16,
    order: ByteOrder,
    header: RequestHeader,
    body: &[u8],
) -> X11Result<Vec<Vec<u8>>> {
    let Some(opcode) = RequestOpcode::from_u8(header.opcode) else {
        log::debug!("Client {}: unsupported opcode {}", client, header.opcode);
        return Err(X11Error::implementation_error().with_opcode(header.opcode));
    };
    log::debug!("Client {}: {} (seq {})", client, opcode, sequence);

    if header.length == 0 || !opcode.length_rule().accepts(header.size()) {
        return Err(X11Error::bad_length().with_opcode(header.opcode));
    }

    let mut request = Request::new(client, opcode, header.detail, sequence, order, body);
    match handler(opcode)(server, &mut request) {
        Ok(()) => Ok(request.into_replies()),
        Err(error) => Err(error.with_opcode(header.opcode)),
    }
}

/// Count, run and answer one request from `client`. Replies and errors are
/// written while the server is locked, so events raised by later requests
/// of other clients cannot overtake them.
pub fn process_request(server: &mut Server, client: ClientId, header: RequestHeader, body: &[u8]) {
    let Some(handle) = server.client(client).cloned() else {
        return;
    };
    let sequence = handle.next_sequence() as u16;
    match dispatch(server, client, sequence, handle.byte_order, header, body) {
        Ok(replies) => {
            for reply in replies {
                if let Err(e) = handle.send(&reply) {
                    log::debug!("Client {}: reply not delivered: {}", client, e);
                    break;
                }
            }
        }
        Err(error) => {
            log::warn!("Client {}: {} (seq {})", client, error, sequence);
            if let Err(e) = handle.send_error(&error) {
                log::debug!("Client {}: error not delivered: {}", client, e);
            }
        }
    }
    server.flush_backend();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_util::*;

    fn header(opcode: u8, detail: u8, body: &[u8]) -> RequestHeader {
        RequestHeader {
            opcode,
            detail,
            length: (body.len() / 4 + 1) as u16,
        }
    }

    #[test]
    fn test_reply_stamped_with_sequence() {
        let mut server = server();
        let (client, buffer) = connect(&mut server);
        process_request(&mut server, client, header(127, 0, &[]), &[]);
        // InternAtom "PRIMARY" only-if-exists
        let mut body = vec![7, 0, 0, 0];
        body.extend_from_slice(b"PRIMARY\0");
        process_request(&mut server, client, header(16, 1, &body), &body);
        let packets = buffer.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0][0], 1);
        assert_eq!(&packets[0][2..4], &[2, 0]);
        assert_eq!(&packets[0][8..12], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_length_and_unknown_opcode_errors() {
        let mut server = server();
        let (client, buffer) = connect(&mut server);
        // GetGeometry declared one word too long
        let body = [3, 0, 0, 0, 0, 0, 0, 0];
        process_request(&mut server, client, header(14, 0, &body), &body);
        process_request(&mut server, client, header(200, 0, &[]), &[]);
        let packets = buffer.take_packets();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0][0], 0);
        assert_eq!(packets[0][1], ErrorCode::Length as u8);
        assert_eq!(packets[0][10], 14);
        assert_eq!(packets[1][1], ErrorCode::Implementation as u8);
        assert_eq!(&packets[1][2..4], &[2, 0]);
    }

    #[test]
    fn test_errors_carry_the_opcode() {
        let mut server = server();
        let (client, buffer) = connect(&mut server);
        let body = 0x1234u32.to_le_bytes();
        process_request(&mut server, client, header(8, 0, &body), &body);
        let packets = buffer.take_packets();
        assert_eq!(packets[0][1], ErrorCode::Window as u8);
        assert_eq!(&packets[0][4..8], &0x1234u32.to_le_bytes());
        assert_eq!(packets[0][10], 8);
    }
}
